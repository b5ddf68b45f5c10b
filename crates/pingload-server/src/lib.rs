//! TCP server: listener, per-connection handlers, request log.
//!
//! This crate provides the pingload server side:
//! - A TCP accept loop that spawns one task per connection, bounded by a
//!   connection semaphore
//! - The framed (and legacy line) request/response connection handler
//! - An append-only per-request CSV log shared across handlers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pingload_server::{ConnectionHandler, ServerConfig, TcpServer, make_connection_handler};
//! use pingload_protocol::WireMode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = TcpServer::new(ServerConfig::default()).await?;
//!     let handler = Arc::new(ConnectionHandler::new(WireMode::Framed));
//!     server.run(make_connection_handler(handler)).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handler;
mod listener;
mod report;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{ConnectionHandler, make_connection_handler};
pub use listener::{Connection, TcpServer};
pub use report::{REQUEST_LOG_HEADER, RequestLog};
