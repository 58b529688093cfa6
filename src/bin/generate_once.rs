//! Run the daily pipeline once against the configured providers and print the result.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;

use daily_compliment::{build_delivery, build_machine, config, open_store};

#[derive(Parser)]
#[command(name = "generate_once")]
#[command(about = "Generate (or read back) the compliment for one date")]
struct Cli {
    /// Target date (YYYY-MM-DD), defaults to today in UTC
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Config file, defaults to $COMPLIMENT_CONFIG_PATH or config/compliment.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also deliver the result to the configured chats
    #[arg(long)]
    deliver: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(true).compact().init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load_default()?,
    };
    let date = cli.date.unwrap_or_else(|| Utc::now().date_naive());

    let store = open_store(&cfg)?;
    let machine = build_machine(&cfg, store);

    if cli.deliver {
        let report = build_delivery(&cfg, machine).deliver(date).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let outcome = machine
        .run(date)
        .await
        .with_context(|| format!("generation for {date} failed"))?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
