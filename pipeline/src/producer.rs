use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use notifier::PriceEvent;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::runner::PromptHook;
use crate::source::LineSource;

/// Parses `<symbol> <price>`: exactly two whitespace-separated tokens, the
/// second a finite, non-negative number.
pub fn parse_update(line: &str) -> Result<PriceEvent, PipelineError> {
    let malformed = |reason: &str| PipelineError::MalformedInput {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    let [symbol, price] = parts.as_slice() else {
        return Err(malformed("expected SYMBOL PRICE"));
    };

    let price: f64 = price
        .parse()
        .map_err(|_| malformed("price is not a number"))?;

    PriceEvent::new(*symbol, price).map_err(|e| malformed(&e.to_string()))
}

/// Reads up to `count` lines and enqueues each as a [`PriceEvent`].
///
/// Stops early, without enqueuing the offending line, on the first malformed
/// line, read error, or end of input; the error is returned. Cancellation is
/// checked before every read and while waiting on the input or the queue.
pub(crate) async fn run_producer<S>(
    mut input: S,
    count: usize,
    tx: Sender<PriceEvent>,
    cancel: CancelToken,
    prompt: Option<PromptHook>,
    produced: Arc<AtomicUsize>,
) -> Option<PipelineError>
where
    S: LineSource,
{
    for i in 0..count {
        if cancel.is_cancelled() {
            debug!(produced = i, "producer observed cancellation");
            return None;
        }

        if let Some(prompt) = &prompt {
            prompt(i + 1, count);
        }

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            line = input.next_line() => line,
        };

        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!(read = i, expected = count, "input ended early");
                return Some(PipelineError::InputExhausted {
                    read: i,
                    expected: count,
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to read update");
                return Some(e.into());
            }
        };

        let event = match parse_update(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "stopping producer on malformed update");
                return Some(e);
            }
        };

        debug!(symbol = %event.symbol, price = event.new_price, "enqueueing update");

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            sent = tx.send(event) => sent,
        };

        if sent.is_err() {
            debug!("consumer gone; producer stopping");
            return None;
        }

        produced.fetch_add(1, Ordering::Relaxed);
    }

    info!(count, "producer finished");
    None
}
