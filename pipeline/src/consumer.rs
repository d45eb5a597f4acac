use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use notifier::{NotificationSubject, PriceEvent};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;

/// Applies queued events one at a time, in FIFO order, until the queue is
/// closed and drained or the run is cancelled. Events still queued at
/// cancellation are dropped.
///
/// Cancellation is only observed between events: an update that has started
/// always runs to completion.
pub(crate) async fn run_consumer(
    subject: Arc<NotificationSubject>,
    mut rx: Receiver<PriceEvent>,
    cancel: CancelToken,
    applied: Arc<AtomicUsize>,
) {
    loop {
        if cancel.is_cancelled() {
            debug!(dropped = rx.len(), "consumer observed cancellation");
            return;
        }

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(dropped = rx.len(), "consumer observed cancellation");
                return;
            }
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match subject.apply_price(&event.symbol, event.new_price).await {
            Ok(outcome) => {
                applied.fetch_add(1, Ordering::Relaxed);
                debug!(
                    symbol = %outcome.symbol,
                    change = %outcome.change,
                    notified = ?outcome.notified,
                    "update applied"
                );
            }
            Err(e) => warn!(symbol = %event.symbol, error = %e, "update rejected"),
        }
    }

    info!(applied = applied.load(Ordering::Relaxed), "consumer drained queue");
}
