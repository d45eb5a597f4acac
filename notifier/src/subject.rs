//! NotificationSubject
//!
//! Applies one price update at a time:
//!   1. read the prior price from the store (missing / unreadable → 0)
//!   2. compute the change against it
//!   3. write the new price, append a history record
//!   4. if the change crosses the threshold, notify observers and report history
//!
//! Steps 3 always complete before step 4 starts. Store writes are best-effort:
//! a failed write is logged and the update still counts as applied.

use std::sync::Arc;
use std::time::Duration;

use common::logger::warn_if_slow;
use store::PriceStore;
use store::keys::{history_key, price_key};
use tracing::{Span, debug, field, info, instrument, warn};

use crate::error::{NotifierError, NotifierResult};
use crate::model::{PriceChange, PriceRecord, format_price, validate};
use crate::observer::{Observer, ObserverHandle};
use crate::registry::ObserverRegistry;
use crate::report::HistoryReport;

/// Source of "now" in unix seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Receives the history report rendered after each notifying update.
pub type ReportHook = Arc<dyn Fn(&HistoryReport) + Send + Sync>;

/// What a single `apply_price` did.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub symbol: String,
    pub prior_price: f64,
    pub new_price: f64,
    pub change: PriceChange,
    pub price_persisted: bool,
    pub history_persisted: bool,
    /// `Some(n)` when the threshold was crossed and `n` observers were notified.
    pub notified: Option<usize>,
}

pub struct NotificationSubject {
    registry: ObserverRegistry,
    store: Arc<dyn PriceStore>,
    /// Percentage, shared by every symbol.
    threshold: f64,
    clock: Clock,
    report_hook: Option<ReportHook>,
    slow_after: Duration,
}

impl NotificationSubject {
    pub fn new(threshold: f64, store: Arc<dyn PriceStore>) -> NotifierResult<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(NotifierError::InvalidThreshold(threshold));
        }

        Ok(Self {
            registry: ObserverRegistry::new(store.clone()),
            store,
            threshold,
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
            report_hook: None,
            slow_after: Duration::from_millis(100),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the default (log at INFO) handling of history reports.
    pub fn with_report_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&HistoryReport) + Send + Sync + 'static,
    {
        self.report_hook = Some(Arc::new(f));
        self
    }

    /// Store calls slower than this are logged, here and in the registry.
    pub fn with_slow_threshold(mut self, slow_after: Duration) -> Self {
        self.slow_after = slow_after;
        self.registry = self.registry.with_slow_threshold(slow_after);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    pub async fn register(&self, observer: &ObserverHandle) -> NotifierResult<()> {
        self.registry.register(observer).await
    }

    pub async fn remove(&self, observer: &dyn Observer) -> NotifierResult<bool> {
        self.registry.remove(observer).await
    }

    /// Applies one update. Only invalid input is an error; store failures are
    /// reflected in the returned outcome.
    #[instrument(
        skip(self),
        target = "subject",
        fields(change = field::Empty, threshold = self.threshold)
    )]
    pub async fn apply_price(&self, symbol: &str, new_price: f64) -> NotifierResult<ApplyOutcome> {
        validate(symbol, new_price)?;

        let prior_price = self.prior_price(symbol).await;
        let change = PriceChange::between(prior_price, new_price);
        Span::current().record("change", field::display(&change));

        info!(prior_price, new_price, %change, "price change computed");

        let price_persisted = match warn_if_slow("set_price", self.slow_after, async {
            self.store
                .set_scalar(&price_key(symbol), &format_price(new_price))
                .await
        })
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to persist price; continuing");
                false
            }
        };

        let record = PriceRecord {
            symbol: symbol.to_string(),
            price: new_price,
            timestamp: (self.clock)(),
        };

        let history_persisted = match warn_if_slow("append_history", self.slow_after, async {
            self.store
                .append_to_list(&history_key(symbol), &record.encode())
                .await
        })
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to append price history; continuing");
                false
            }
        };

        let mut outcome = ApplyOutcome {
            symbol: symbol.to_string(),
            prior_price,
            new_price,
            change,
            price_persisted,
            history_persisted,
            notified: None,
        };

        if !change.crosses(self.threshold) {
            debug!("change below threshold; observers not notified");
            return Ok(outcome);
        }

        let delivered = self.registry.notify_all(symbol, new_price);
        info!(delivered, "observers notified");
        outcome.notified = Some(delivered);

        self.emit_report(symbol).await;

        Ok(outcome)
    }

    /// Last persisted price, if any.
    pub async fn current_price(&self, symbol: &str) -> NotifierResult<Option<f64>> {
        let raw = self.store.get_scalar(&price_key(symbol)).await?;
        Ok(raw.and_then(|v| v.trim().parse().ok()))
    }

    /// Full history for `symbol`, oldest first. Undecodable entries are counted
    /// and skipped.
    pub async fn history(&self, symbol: &str) -> NotifierResult<HistoryReport> {
        let entries = warn_if_slow("range_history", self.slow_after, async {
            self.store.range_list(&history_key(symbol), 0, -1).await
        })
        .await?;

        let total = entries.len();
        let records: Vec<PriceRecord> = entries
            .iter()
            .filter_map(|e| PriceRecord::decode(symbol, e))
            .collect();

        Ok(HistoryReport {
            symbol: symbol.to_string(),
            skipped: total - records.len(),
            records,
        })
    }

    async fn prior_price(&self, symbol: &str) -> f64 {
        let read = warn_if_slow("get_price", self.slow_after, async {
            self.store.get_scalar(&price_key(symbol)).await
        })
        .await;

        match read {
            Ok(Some(raw)) => match raw.trim().parse::<f64>() {
                Ok(p) if p.is_finite() && p >= 0.0 => p,
                _ => {
                    warn!(raw = %raw, "stored price unreadable; treating prior as zero");
                    0.0
                }
            },
            Ok(None) => 0.0,
            Err(e) => {
                warn!(error = %e, "failed to read prior price; treating as zero");
                0.0
            }
        }
    }

    async fn emit_report(&self, symbol: &str) {
        match self.history(symbol).await {
            Ok(report) => match &self.report_hook {
                Some(hook) => hook(&report),
                None => info!("\n{report}"),
            },
            Err(e) => warn!(error = %e, "failed to load price history for report"),
        }
    }
}
