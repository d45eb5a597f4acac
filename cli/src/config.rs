use std::str::FromStr;
use std::time::Duration;

use pipeline::PipelineConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// SQLite connection string for the durable store.
    pub database_url: String,

    /// Use a throwaway in-memory store instead of `database_url`.
    pub in_memory: bool,

    /// Global notification threshold, in percent.
    pub price_threshold: f64,

    // =========================
    // Pipeline configuration
    // =========================
    /// Wall-clock limit for one run of the update pipeline.
    pub pipeline_deadline_secs: u64,

    /// Capacity of the channel between producer and consumer.
    ///
    /// A full queue blocks the producer until the consumer catches up.
    pub pipeline_queue_capacity: usize,

    /// Time stages get to stop after cancellation before being abandoned.
    pub pipeline_grace_ms: u64,

    /// Store calls slower than this are logged at WARN.
    pub gateway_slow_ms: u64,

    /// `production` switches logs to JSON.
    pub app_env: String,

    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://stock_observer.db".to_string());
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Self {
            database_url,
            in_memory: false,
            price_threshold: env_or("PRICE_THRESHOLD", 0.0),

            pipeline_deadline_secs: env_or("PIPELINE_DEADLINE_SECS", 30),
            pipeline_queue_capacity: env_or("PIPELINE_QUEUE_CAPACITY", 100),
            pipeline_grace_ms: env_or("PIPELINE_GRACE_MS", 2_000),

            gateway_slow_ms: env_or("GATEWAY_SLOW_MS", 100),

            json_logs: app_env == "production",
            app_env,
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            queue_capacity: self.pipeline_queue_capacity,
            deadline: Duration::from_secs(self.pipeline_deadline_secs),
            grace: Duration::from_millis(self.pipeline_grace_ms),
        }
    }

    pub fn gateway_slow(&self) -> Duration {
        Duration::from_millis(self.gateway_slow_ms)
    }
}

/// Unset or unparsable variables fall back to `default`.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_config_converts_units() {
        let cfg = AppConfig {
            database_url: "sqlite::memory:".into(),
            in_memory: true,
            price_threshold: 5.0,
            pipeline_deadline_secs: 7,
            pipeline_queue_capacity: 3,
            pipeline_grace_ms: 250,
            gateway_slow_ms: 40,
            app_env: "test".into(),
            json_logs: false,
        };

        let p = cfg.pipeline();
        assert_eq!(p.deadline, Duration::from_secs(7));
        assert_eq!(p.grace, Duration::from_millis(250));
        assert_eq!(p.queue_capacity, 3);
        assert_eq!(cfg.gateway_slow(), Duration::from_millis(40));
    }

    #[test]
    fn unset_variable_uses_default() {
        assert_eq!(env_or("STOCK_OBSERVER_TEST_UNSET_VAR", 42u64), 42);
    }
}
