//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pingload_protocol::WireMode;

/// pingload - TCP ping/pong load-testing harness
#[derive(Debug, Parser)]
#[command(name = "pingload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "PINGLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the ping/pong server in the foreground
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 9000)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        /// Wire protocol: framed (length-prefixed JSON) or line (ping/pong lines)
        #[arg(long, default_value = "framed", value_parser = parse_wire_mode)]
        wire: WireMode,

        /// Maximum concurrent connections
        #[arg(long, default_value_t = 1024)]
        max_connections: usize,

        /// Per-read idle timeout in seconds (no timeout when omitted)
        #[arg(long)]
        idle_timeout: Option<u64>,

        /// Append a per-request CSV log to this path
        #[arg(long)]
        request_log: Option<PathBuf>,
    },

    /// Run concurrent client sessions against a server
    Run {
        /// Server host (default: config file, then 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Server port (default: config file, then 9000)
        #[arg(long)]
        port: Option<u16>,

        /// Messages per session
        #[arg(long, short, default_value_t = 10)]
        messages: u32,

        /// Number of concurrent client sessions
        #[arg(long, short, default_value_t = 1)]
        clients: u32,

        /// Base client identifier; the session index is appended
        #[arg(long)]
        client_id: Option<String>,

        /// Number of servers in the scenario, recorded in the result log
        #[arg(long, default_value_t = 1)]
        servers: u32,

        /// Scenario identifier recorded in the result log
        #[arg(long)]
        scenario: Option<String>,

        /// Repetition index recorded in the result log
        #[arg(long, default_value_t = 1)]
        repetition: u32,

        /// Wire protocol: framed or line
        #[arg(long, default_value = "framed", value_parser = parse_wire_mode)]
        wire: WireMode,

        /// Send all messages back-to-back, then drain the responses
        #[arg(long)]
        pipelined: bool,

        /// Connect timeout in seconds (default: config file, then 5)
        #[arg(long)]
        timeout: Option<u64>,

        /// Whole-session timeout in seconds (unbounded when omitted)
        #[arg(long)]
        session_timeout: Option<u64>,

        /// Result CSV path (default: config file, then results/pingload.csv)
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn parse_wire_mode(s: &str) -> Result<WireMode, String> {
    s.parse()
}
