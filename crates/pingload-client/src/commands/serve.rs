//! Serve command — starts the ping/pong server in the foreground.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use pingload_protocol::WireMode;
use pingload_server::{
    ConnectionHandler, RequestLog, ServerConfig, TcpServer, make_connection_handler,
};

use crate::error::{ClientError, ClientResult};

/// Resolved options for the serve command.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub bind: SocketAddr,
    pub wire: WireMode,
    pub max_connections: usize,
    pub idle_timeout: Option<Duration>,
    pub request_log: Option<PathBuf>,
}

/// Starts the server and blocks until Ctrl-C.
pub async fn run(opts: ServeOptions) -> ClientResult<()> {
    let mut config = ServerConfig::new(opts.bind)
        .with_wire(opts.wire)
        .with_max_connections(opts.max_connections);
    if let Some(timeout) = opts.idle_timeout {
        config = config.with_idle_timeout(timeout);
    }

    let server = TcpServer::new(config)
        .await
        .map_err(|e| ClientError::Config(format!("failed to start server: {}", e)))?;
    let addr = server
        .local_addr()
        .map_err(|e| ClientError::Config(e.to_string()))?;

    let handler = match opts.request_log {
        Some(path) => {
            info!(path = %path.display(), "Request log enabled");
            ConnectionHandler::with_request_log(
                opts.wire,
                Arc::new(RequestLog::new(path, addr.port())),
            )
        }
        None => ConnectionHandler::new(opts.wire),
    };

    server
        .run_until_shutdown(make_connection_handler(Arc::new(handler)), shutdown_signal())
        .await
        .map_err(|e| ClientError::Config(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    // An error here means signals are unavailable on this platform; the
    // server then simply runs until killed.
    let _ = tokio::signal::ctrl_c().await;
}
