// src/config/mod.rs
pub mod app;

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub use app::AppConfig;

pub const ENV_CONFIG_PATH: &str = "COMPLIMENT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/compliment.toml";

/// Load and validate config from an explicit TOML path.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $COMPLIMENT_CONFIG_PATH
/// 2) config/compliment.toml
/// 3) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_p.exists() {
        return load_from(&default_p);
    }
    tracing::info!(target: "config", "no config file found, using defaults");
    Ok(AppConfig::default())
}
