//! Client configuration.
//!
//! Optional settings live in a `pingload.toml` file in the working
//! directory (the benchmark harness keeps one per scenario matrix);
//! command-line flags override everything here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for the pingload CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Result log settings.
    #[serde(default)]
    pub report: ReportSettings,
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Server host.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Connect timeout in seconds.
    pub timeout: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            timeout: 5,
        }
    }
}

/// Result log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Where session result rows are appended.
    pub path: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("results/pingload.csv"),
        }
    }
}

impl ClientConfig {
    /// Default config file name, looked up in the working directory.
    pub const DEFAULT_PATH: &'static str = "pingload.toml";

    /// Loads configuration from the given path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }

    /// Loads `pingload.toml` from the working directory, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, String> {
        let path = Path::new(Self::DEFAULT_PATH);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }
}
