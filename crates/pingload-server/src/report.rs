//! Per-request CSV log.
//!
//! One row per handled request, consumed by the external statistics
//! tooling alongside the client result log. Column order is fixed.

use std::path::PathBuf;

use tracing::warn;

use pingload_core::CsvLog;

/// Column order of the server request log.
pub const REQUEST_LOG_HEADER: [&str; 7] = [
    "timestamp_request",
    "timestamp_response",
    "client_id",
    "sequence",
    "response_time_ms",
    "status",
    "server_port",
];

/// Append-only log of handled requests, shared by all connection handlers.
#[derive(Debug)]
pub struct RequestLog {
    log: CsvLog,
    port: u16,
}

impl RequestLog {
    /// Creates a request log writing to `path`, tagging rows with the
    /// server port.
    pub fn new(path: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            log: CsvLog::new(path.into(), &REQUEST_LOG_HEADER),
            port,
        }
    }

    /// Records one handled request.
    ///
    /// Logging failures are reported but never propagate: a full disk must
    /// not take down the connection that tried to log.
    pub fn record(
        &self,
        client_id: &str,
        sequence: u64,
        timestamp_request: i64,
        timestamp_response: i64,
        status: &str,
    ) {
        let row = vec![
            timestamp_request.to_string(),
            timestamp_response.to_string(),
            client_id.to_string(),
            sequence.to_string(),
            (timestamp_response - timestamp_request).to_string(),
            status.to_string(),
            self.port.to_string(),
        ];
        if let Err(e) = self.log.append(&row) {
            warn!(path = %self.log.path().display(), error = %e, "Failed to append request log row");
        }
    }
}
