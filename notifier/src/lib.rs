//! Price-change notification core.
//!
//! [`NotificationSubject`] reads the last-known price of a symbol from the
//! store, persists the new price and a history record, and fans out to the
//! observers held in its [`ObserverRegistry`] when the percentage change
//! crosses the configured threshold.

pub mod error;
pub mod investor;
pub mod model;
pub mod observer;
pub mod registry;
pub mod report;
pub mod subject;

pub use error::{NotifierError, NotifierResult};
pub use investor::{Investor, InvestorDirectory};
pub use model::{PriceChange, PriceEvent, PriceRecord};
pub use observer::{Observer, ObserverHandle};
pub use registry::ObserverRegistry;
pub use report::HistoryReport;
pub use subject::{ApplyOutcome, Clock, NotificationSubject, ReportHook};
