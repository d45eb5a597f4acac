use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::logger::{TraceId, child_span, root_span};
use notifier::NotificationSubject;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, warn};

use crate::cancel::CancelToken;
use crate::consumer::run_consumer;
use crate::error::PipelineError;
use crate::producer::run_producer;
use crate::source::LineSource;

/// Called before each line is read with `(index, count)`, index 1-based.
pub type PromptHook = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound of the producer/consumer queue. Zero is treated as one.
    pub queue_capacity: usize,
    /// Wall-clock limit for the whole run.
    pub deadline: Duration,
    /// How long stages get to wind down after cancellation before they are
    /// abandoned.
    pub grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            deadline: Duration::from_secs(30),
            grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Producer finished (or stopped on bad input) and the queue drained.
    Completed,
    /// The caller's token was cancelled.
    Canceled,
    /// The deadline elapsed first.
    TimedOut,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Canceled => write!(f, "canceled"),
            Termination::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug)]
pub struct PipelineReport {
    pub trace_id: TraceId,
    pub termination: Termination,
    /// Events enqueued by the producer.
    pub produced: usize,
    /// Events the consumer had applied successfully when the run returned.
    pub applied: usize,
    /// Why the producer stopped before `count` lines, if it did.
    pub producer_error: Option<PipelineError>,
    /// Stages were still running when the grace period ran out and were
    /// detached. An update they had started still completes.
    pub abandoned: bool,
}

/// Runs producer and consumer stages against one [`NotificationSubject`].
pub struct UpdatePipeline {
    subject: Arc<NotificationSubject>,
    config: PipelineConfig,
    prompt: Option<PromptHook>,
}

impl UpdatePipeline {
    pub fn new(subject: Arc<NotificationSubject>, config: PipelineConfig) -> Self {
        Self {
            subject,
            config,
            prompt: None,
        }
    }

    pub fn with_prompt<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.prompt = Some(Arc::new(f));
        self
    }

    /// Reads `count` updates from `input` and applies them in order.
    ///
    /// Producer and consumer run as separate tasks. Returns when both have
    /// stopped, `cancel` fires, or the deadline elapses, whichever is first.
    /// On cancellation or deadline the token is set, the event being applied
    /// (if any) finishes, and queued events are dropped. The deadline cancels
    /// `cancel` itself, so pass a fresh token per run.
    ///
    /// Tasks still running when the grace period ends are detached, not
    /// aborted: an update in flight completes in the background.
    pub async fn run<S>(&self, input: S, count: usize, cancel: &CancelToken) -> PipelineReport
    where
        S: LineSource + 'static,
    {
        let trace_id = TraceId::new();

        self.run_inner(input, count, cancel, trace_id)
            .instrument(root_span("update_pipeline", &trace_id))
            .await
    }

    async fn run_inner<S>(
        &self,
        input: S,
        count: usize,
        cancel: &CancelToken,
        trace_id: TraceId,
    ) -> PipelineReport
    where
        S: LineSource + 'static,
    {
        info!(
            count,
            threshold = self.subject.threshold(),
            queue_capacity = self.config.queue_capacity,
            deadline_ms = self.config.deadline.as_millis() as u64,
            "pipeline starting"
        );

        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let produced = Arc::new(AtomicUsize::new(0));
        let applied = Arc::new(AtomicUsize::new(0));

        let producer = tokio::spawn(
            run_producer(
                input,
                count,
                tx,
                cancel.clone(),
                self.prompt.clone(),
                produced.clone(),
            )
            .instrument(child_span("producer")),
        );

        let consumer = tokio::spawn(
            run_consumer(self.subject.clone(), rx, cancel.clone(), applied.clone())
                .instrument(child_span("consumer")),
        );

        // Dropping this future only detaches the tasks.
        let stages = async move {
            let (producer, consumer) = tokio::join!(producer, consumer);

            if let Err(e) = consumer {
                error!(error = %e, "consumer task failed");
            }

            producer.unwrap_or_else(|e| {
                error!(error = %e, "producer task failed");
                None
            })
        };
        tokio::pin!(stages);

        let deadline = tokio::time::sleep(self.config.deadline);
        tokio::pin!(deadline);

        let (termination, producer_error, abandoned) = tokio::select! {
            biased;

            producer_error = &mut stages => {
                let termination = if cancel.is_cancelled() {
                    Termination::Canceled
                } else {
                    Termination::Completed
                };
                (termination, producer_error, false)
            }

            _ = cancel.cancelled() => {
                info!("pipeline cancelled; waiting for stages to stop");
                let (producer_error, abandoned) = settle(self.config.grace, &mut stages).await;
                (Termination::Canceled, producer_error, abandoned)
            }

            _ = &mut deadline => {
                warn!("pipeline deadline elapsed; cancelling stages");
                cancel.cancel();
                let (producer_error, abandoned) = settle(self.config.grace, &mut stages).await;
                (Termination::TimedOut, producer_error, abandoned)
            }
        };

        let report = PipelineReport {
            trace_id,
            termination,
            produced: produced.load(Ordering::Relaxed),
            applied: applied.load(Ordering::Relaxed),
            producer_error,
            abandoned,
        };

        info!(
            termination = %report.termination,
            produced = report.produced,
            applied = report.applied,
            abandoned = report.abandoned,
            "pipeline finished"
        );

        report
    }
}

/// Gives cancelled stages `grace` to return. `(producer_error, abandoned)`.
async fn settle<F>(grace: Duration, stages: F) -> (Option<PipelineError>, bool)
where
    F: Future<Output = Option<PipelineError>> + Unpin,
{
    match tokio::time::timeout(grace, stages).await {
        Ok(producer_error) => (producer_error, false),
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "stages did not stop in time; detaching");
            (None, true)
        }
    }
}
