//! Core types: time helpers, result records, CSV log, tracing

pub mod report;
pub mod time;
pub mod tracing;

pub use report::{CsvLog, ResultRecord, SessionStatus, RESULT_LOG_HEADER};
pub use time::{format_rfc3339, unix_millis};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
