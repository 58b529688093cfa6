// src/generate/prompt.rs
use crate::ingest::types::Headline;

/// A rendered chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// System + user templates. The user template may reference `{title}` and
/// `{description}`; a missing description renders as an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
    user: String,
}

impl PromptTemplate {
    pub fn new(system: &str, user: &str) -> Self {
        Self {
            system: system.to_string(),
            user: user.to_string(),
        }
    }

    pub fn render(&self, headline: &Headline) -> Prompt {
        let user = self
            .user
            .replace("{title}", &headline.title)
            .replace("{description}", headline.description.as_deref().unwrap_or(""));
        Prompt {
            system: self.system.clone(),
            user,
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(
            "Generate a funny compliment based on recent news:",
            "title: {title}\ndescription: {description}",
        )
    }
}
