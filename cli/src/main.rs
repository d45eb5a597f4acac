mod cli;
mod config;
mod menu;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use common::logger::init_logger;
use notifier::{InvestorDirectory, NotificationSubject};
use pipeline::UpdatePipeline;
use store::{InMemoryStore, PriceStore, SqliteStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::menu::Menu;

/// Connects the configured backend and creates its schema.
async fn init_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn PriceStore>> {
    if cfg.in_memory {
        info!("using in-memory store");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("failed to open store at {}", cfg.database_url))?;

    info!(database_url = %cfg.database_url, "store ready");
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().apply(AppConfig::from_env());
    init_logger("stock-observer", cfg.json_logs);

    info!(
        app_env = %cfg.app_env,
        threshold = cfg.price_threshold,
        deadline_secs = cfg.pipeline_deadline_secs,
        queue_capacity = cfg.pipeline_queue_capacity,
        "starting stock observer"
    );

    let store = init_store(&cfg).await?;

    let subject = NotificationSubject::new(cfg.price_threshold, store.clone())?
        .with_slow_threshold(cfg.gateway_slow())
        .with_report_hook(|report| println!("{report}"));
    let subject = Arc::new(subject);

    let pipeline = UpdatePipeline::new(subject.clone(), cfg.pipeline()).with_prompt(|i, n| {
        print!("Update [{i}/{n}] => Enter <Symbol> <NewPrice>: ");
        let _ = std::io::stdout().flush();
    });

    let directory = InvestorDirectory::new(store);
    let input = BufReader::new(tokio::io::stdin()).lines();

    Menu::new(subject, directory, pipeline, input).run().await?;

    info!("stock observer stopped");
    Ok(())
}
