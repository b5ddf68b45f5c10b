//! Append-only CSV result log.
//!
//! Every client session and every server request produces one CSV row that
//! the external statistics tooling aggregates. Many sessions (or connection
//! handlers) append concurrently, so the check-header-then-append sequence
//! runs under a single mutex: the header is written exactly once per file,
//! and rows are never interleaved.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::format_rfc3339;

/// Column order of the client result log.
///
/// The order is fixed: the downstream merge/statistics scripts select these
/// columns by name but diff runs by position, so a reordering breaks them.
pub const RESULT_LOG_HEADER: [&str; 12] = [
    "cenario_id",
    "repeticao",
    "cliente_id",
    "num_clientes",
    "num_servidores",
    "num_mensagens",
    "tempo_inicio",
    "tempo_fim",
    "tempo_total_ms",
    "status",
    "erro",
    "mem_mb",
];

/// Terminal status of one client session.
///
/// The string values are the vocabulary the external statistics collector
/// matches on and must not be translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Connected and every response validated.
    #[serde(rename = "sucesso")]
    Success,
    /// A response decoded but its content was wrong.
    #[serde(rename = "falha")]
    ValidationFailed,
    /// The TCP connection could not be established within the timeout.
    #[serde(rename = "erro_conexao")]
    ConnectError,
    /// A write failed mid-session.
    #[serde(rename = "erro_envio")]
    SendError,
    /// A read failed or the peer closed before all responses arrived.
    #[serde(rename = "erro_resposta")]
    RecvError,
}

impl SessionStatus {
    /// Returns the status string written to the result log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "sucesso",
            Self::ValidationFailed => "falha",
            Self::ConnectError => "erro_conexao",
            Self::SendError => "erro_envio",
            Self::RecvError => "erro_resposta",
        }
    }

    /// Returns true for a fully successful session.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the client result log: the outcome of a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Scenario identifier, e.g. "R3".
    pub scenario_id: String,
    /// Repetition index within the scenario.
    pub repetition: u32,
    /// Client index (1-based) within the scenario.
    pub client_index: u32,
    /// Number of concurrent clients in the scenario.
    pub num_clients: u32,
    /// Number of servers in the scenario.
    pub num_servers: u32,
    /// Messages sent per session.
    pub num_messages: u32,
    /// Session start time.
    pub started_at: DateTime<Utc>,
    /// Session end time.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration of the session in milliseconds.
    pub elapsed_ms: f64,
    /// Terminal status.
    pub status: SessionStatus,
    /// Error detail; empty on success.
    pub error: String,
    /// Resident memory sample in MiB, when collected.
    pub mem_mb: Option<f64>,
}

impl ResultRecord {
    /// Renders the record as a CSV row in [`RESULT_LOG_HEADER`] order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.scenario_id.clone(),
            self.repetition.to_string(),
            self.client_index.to_string(),
            self.num_clients.to_string(),
            self.num_servers.to_string(),
            self.num_messages.to_string(),
            format_rfc3339(self.started_at),
            format_rfc3339(self.finished_at),
            format!("{:.2}", self.elapsed_ms),
            self.status.to_string(),
            self.error.clone(),
            self.mem_mb.map(|m| format!("{:.2}", m)).unwrap_or_default(),
        ]
    }
}

/// Append-only CSV log with write-header-once semantics.
///
/// Owned by the process and injected into whatever produces rows; the mutex
/// serializes the existence check, header write and row append so concurrent
/// writers never corrupt the file.
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    header: Vec<&'static str>,
    lock: Mutex<()>,
}

impl CsvLog {
    /// Creates a log that will write to `path` with the given header.
    ///
    /// The file is not touched until the first append.
    pub fn new(path: impl Into<PathBuf>, header: &[&'static str]) -> Self {
        Self {
            path: path.into(),
            header: header.to_vec(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the header first if the file is new or empty.
    pub fn append(&self, row: &[String]) -> io::Result<()> {
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            // A poisoned lock only means another writer panicked mid-append;
            // the file itself is still append-consistent.
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(file, "{}", format_row(&self.header))?;
        }
        writeln!(file, "{}", format_row(row))?;
        file.flush()
    }
}

/// Renders one CSV row, quoting fields that need it.
fn format_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
