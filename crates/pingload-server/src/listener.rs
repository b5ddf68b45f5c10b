//! TCP listener and per-connection transport.
//!
//! This module provides the async TCP server that accepts benchmark client
//! connections and the [`Connection`] type that reads and writes one frame
//! (or line, in the legacy wire mode) at a time.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use pingload_protocol::{HEADER_LEN, ProtocolError, encode_frame, parse_header};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// TCP server for handling benchmark client connections.
pub struct TcpServer {
    /// Server configuration.
    config: ServerConfig,
    /// TCP listener.
    listener: TcpListener,
    /// Semaphore for limiting concurrent connections.
    connection_semaphore: Arc<Semaphore>,
}

impl TcpServer {
    /// Creates a new server bound to the configured address.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(
            addr = %listener.local_addr()?,
            wire = %config.wire,
            "Server listening"
        );

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    /// Returns the actual bound address (useful when binding port 0).
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accepts a single connection.
    ///
    /// Waits for a connection slot first, so a flood of clients beyond
    /// `max_connections` queues in the accept backlog instead of spawning
    /// unbounded handlers.
    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = self.connection_semaphore.clone().acquire_owned().await;
        let permit = permit.expect("semaphore should not be closed");

        let (stream, peer) = self.listener.accept().await?;
        debug!(peer = %peer, "Accepted new connection");

        Ok(Connection {
            stream: BufReader::new(stream),
            peer,
            idle_timeout: self.config.idle_timeout,
            _permit: permit,
        })
    }

    /// Runs the accept loop, spawning the handler for each connection.
    ///
    /// Handler dispatch is fire-and-forget: the loop only ever blocks on
    /// accept, never on a connection.
    pub async fn run<F, Fut>(&self, handler: F) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    let fut = handler(connection);
                    tokio::spawn(fut);
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    // Continue accepting despite errors
                }
            }
        }
    }

    /// Runs the accept loop until the shutdown future completes.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
        S: std::future::Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

/// One accepted client connection.
///
/// Owned exclusively by its handler task; dropping it closes the socket and
/// releases the connection slot.
pub struct Connection {
    stream: BufReader<TcpStream>,
    peer: SocketAddr,
    idle_timeout: Option<Duration>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl Connection {
    /// Returns the peer address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Reads one frame payload.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly
    /// (EOF before a full header). EOF mid-payload is an abrupt disconnect
    /// and surfaces as [`ProtocolError::IncompleteFrame`].
    pub async fn read_frame(&mut self) -> ServerResult<Option<Vec<u8>>> {
        let mut header = [0u8; HEADER_LEN];
        match maybe_timeout(
            self.idle_timeout,
            "read frame header",
            self.stream.read_exact(&mut header),
        )
        .await
        {
            Ok(_) => {}
            Err(ServerError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let len = parse_header(&header).map_err(ServerError::Protocol)?;

        let mut payload = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = maybe_timeout(
                self.idle_timeout,
                "read frame payload",
                self.stream.read(&mut payload[filled..]),
            )
            .await?;
            if n == 0 {
                return Err(ServerError::Protocol(ProtocolError::IncompleteFrame {
                    expected: len,
                    received: filled,
                }));
            }
            filled += n;
        }

        Ok(Some(payload))
    }

    /// Writes one frame.
    pub async fn write_frame(&mut self, payload: &[u8]) -> ServerResult<()> {
        let data = encode_frame(payload).map_err(ServerError::Protocol)?;
        maybe_timeout(
            self.idle_timeout,
            "write frame",
            self.stream.get_mut().write_all(&data),
        )
        .await?;
        Ok(())
    }

    /// Reads one line in the legacy wire mode, without the trailing newline.
    ///
    /// Returns `Ok(None)` on EOF.
    pub async fn read_line(&mut self) -> ServerResult<Option<String>> {
        let mut line = String::new();
        let n = maybe_timeout(
            self.idle_timeout,
            "read line",
            self.stream.read_line(&mut line),
        )
        .await?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Writes one line in the legacy wire mode, appending the newline.
    pub async fn write_line(&mut self, line: &str) -> ServerResult<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        maybe_timeout(
            self.idle_timeout,
            "write line",
            self.stream.get_mut().write_all(&data),
        )
        .await?;
        Ok(())
    }
}

/// Awaits `fut`, bounded by `limit` when one is configured.
async fn maybe_timeout<F, T>(limit: Option<Duration>, operation: &str, fut: F) -> ServerResult<T>
where
    F: std::future::Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ServerError::Protocol(ProtocolError::timeout(operation))),
        },
        None => Ok(fut.await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn test_server() -> TcpServer {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        TcpServer::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn frame_roundtrip() {
        let server = test_server().await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"00000004ping").await.unwrap();

            let mut response = [0u8; 12];
            stream.read_exact(&mut response).await.unwrap();
            assert_eq!(&response, b"00000004pong");
        });

        let mut conn = server.accept().await.unwrap();
        let payload = conn.read_frame().await.unwrap().unwrap();
        assert_eq!(payload, b"ping");
        conn.write_frame(b"pong").await.unwrap();

        client.await.unwrap();
    }

    #[tokio::test]
    async fn clean_disconnect_returns_none() {
        let server = test_server().await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let _stream = TcpStream::connect(addr).await.unwrap();
            // Dropped immediately: clean close before any frame.
        });

        let mut conn = server.accept().await.unwrap();
        client.await.unwrap();
        assert!(conn.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_header_is_clean_disconnect() {
        let server = test_server().await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"0000").await.unwrap();
        });

        let mut conn = server.accept().await.unwrap();
        client.await.unwrap();
        assert!(conn.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_header_is_framing_error() {
        let server = test_server().await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"notdigitjunk").await.unwrap();
        });

        let mut conn = server.accept().await.unwrap();
        let result = conn.read_frame().await;
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::InvalidHeader(_)))
        ));
        client.await.unwrap();
    }

    #[tokio::test]
    async fn truncated_payload_is_abrupt_disconnect() {
        let server = test_server().await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"00000010abc").await.unwrap();
        });

        let mut conn = server.accept().await.unwrap();
        client.await.unwrap();
        let result = conn.read_frame().await;
        match result {
            Err(ServerError::Protocol(ProtocolError::IncompleteFrame { expected, received })) => {
                assert_eq!(expected, 10);
                assert_eq!(received, 3);
            }
            other => panic!("expected IncompleteFrame, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn line_roundtrip() {
        let server = test_server().await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"ping\n").await.unwrap();

            let mut response = [0u8; 5];
            stream.read_exact(&mut response).await.unwrap();
            assert_eq!(&response, b"pong\n");
        });

        let mut conn = server.accept().await.unwrap();
        let line = conn.read_line().await.unwrap().unwrap();
        assert_eq!(line, "ping");
        conn.write_line("pong").await.unwrap();

        client.await.unwrap();
    }

    #[tokio::test]
    async fn idle_timeout_fires() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
            .with_idle_timeout(Duration::from_millis(50));
        let server = TcpServer::new(config).await.unwrap();
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            // Hold the connection open without sending anything.
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(stream);
        });

        let mut conn = server.accept().await.unwrap();
        let result = conn.read_frame().await;
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::Timeout { .. }))
        ));
        client.abort();
    }
}
