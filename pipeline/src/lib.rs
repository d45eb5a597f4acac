//! Concurrent price-update pipeline.
//!
//! A producer stage reads a fixed number of `<symbol> <price>` lines and
//! enqueues them on a bounded channel; a consumer stage applies them one by one
//! to a [`notifier::NotificationSubject`]. Both stages share one
//! [`CancelToken`], and the whole run races a wall-clock deadline.

pub mod cancel;
pub mod error;
pub mod source;

mod consumer;
mod producer;
mod runner;

pub use cancel::CancelToken;
pub use error::PipelineError;
pub use producer::parse_update;
pub use runner::{PipelineConfig, PipelineReport, PromptHook, Termination, UpdatePipeline};
pub use source::LineSource;
