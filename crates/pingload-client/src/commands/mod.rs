//! Subcommand implementations.

pub mod run;
pub mod serve;
