use clap::Parser;

use crate::config::AppConfig;

/// Flags override the environment; anything left unset keeps the value from
/// [`AppConfig::from_env`].
#[derive(Debug, Parser)]
#[clap(name = "stock-observer", version)]
pub struct Cli {
    /// SQLite connection string
    #[clap(long)]
    pub database_url: Option<String>,

    /// Percentage change that triggers notifications
    #[clap(long)]
    pub threshold: Option<f64>,

    /// Wall-clock limit for one pipeline run, in seconds
    #[clap(long)]
    pub deadline_secs: Option<u64>,

    /// Bound of the producer/consumer queue
    #[clap(long)]
    pub queue_capacity: Option<usize>,

    /// Keep everything in memory; nothing is written to disk
    #[clap(long)]
    pub in_memory: bool,

    /// Emit logs as JSON
    #[clap(long)]
    pub json_logs: bool,
}

impl Cli {
    pub fn apply(self, mut cfg: AppConfig) -> AppConfig {
        if let Some(url) = self.database_url {
            cfg.database_url = url;
        }
        if let Some(threshold) = self.threshold {
            cfg.price_threshold = threshold;
        }
        if let Some(secs) = self.deadline_secs {
            cfg.pipeline_deadline_secs = secs;
        }
        if let Some(capacity) = self.queue_capacity {
            cfg.pipeline_queue_capacity = capacity;
        }
        cfg.in_memory |= self.in_memory;
        cfg.json_logs |= self.json_logs;
        cfg
    }
}
