//! CLI, session driver, load runner
//!
//! This crate provides the `pingload` command-line interface: the `serve`
//! subcommand runs the ping/pong server in the foreground, and the `run`
//! subcommand drives concurrent client sessions and records their results.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use session::{ExchangeMode, SessionConfig, SessionOutcome, run_session};
