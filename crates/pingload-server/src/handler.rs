//! Per-connection request/response handler.
//!
//! Each accepted connection gets one handler invocation that loops
//! header → payload → dispatch → response until the peer disconnects or a
//! framing error makes the stream unrecoverable. Handlers share nothing
//! with each other apart from the optional request log.

use std::sync::Arc;

use tracing::{debug, warn};

use pingload_core::unix_millis;
use pingload_protocol::{PING_LINE, PONG_LINE, ProtocolError, Request, Response, WireMode};

use crate::error::ServerResult;
use crate::listener::Connection;
use crate::report::RequestLog;

/// Drives accepted connections through the request/response loop.
pub struct ConnectionHandler {
    wire: WireMode,
    request_log: Option<Arc<RequestLog>>,
}

impl ConnectionHandler {
    /// Creates a handler for the given wire mode, without request logging.
    pub fn new(wire: WireMode) -> Self {
        Self {
            wire,
            request_log: None,
        }
    }

    /// Creates a handler that records every handled request.
    pub fn with_request_log(wire: WireMode, request_log: Arc<RequestLog>) -> Self {
        Self {
            wire,
            request_log: Some(request_log),
        }
    }

    /// Builds the response for one decoded request.
    ///
    /// PING (case-insensitive) gets a PONG echoing the correlation fields;
    /// everything else gets a generic acknowledgement.
    pub fn respond_to(&self, request: &Request, timestamp: i64) -> Response {
        if request.is_ping() {
            Response::pong(request, timestamp)
        } else {
            Response::ack(request, timestamp)
        }
    }

    /// Handles one connection until it terminates.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        match self.wire {
            WireMode::Framed => self.run_framed(&mut conn).await,
            WireMode::Line => self.run_line(&mut conn).await,
        }
    }

    /// Framed loop: one length-prefixed JSON request per iteration.
    async fn run_framed(&self, conn: &mut Connection) -> ServerResult<()> {
        loop {
            let payload = match conn.read_frame().await? {
                Some(payload) => payload,
                None => {
                    debug!(peer = %conn.peer(), "Client disconnected");
                    return Ok(());
                }
            };

            let received_at = unix_millis();
            let response = match serde_json::from_slice::<Request>(&payload) {
                Ok(request) => {
                    let now = unix_millis();
                    let response = self.respond_to(&request, now);
                    if let Some(log) = &self.request_log {
                        // Fall back to the receive time when the client did
                        // not stamp the request.
                        let timestamp_request = if request.timestamp != 0 {
                            request.timestamp
                        } else {
                            received_at
                        };
                        log.record(
                            request.client_id_or_unknown(),
                            request.sequence,
                            timestamp_request,
                            now,
                            "success",
                        );
                    }
                    response
                }
                Err(e) => {
                    // Malformed JSON is recoverable per-message: reply with
                    // an error response and keep the connection open.
                    debug!(peer = %conn.peer(), error = %e, "Failed to decode request payload");
                    let now = unix_millis();
                    if let Some(log) = &self.request_log {
                        log.record("unknown", 0, received_at, now, "error");
                    }
                    Response::decode_error(now)
                }
            };

            let json = serde_json::to_vec(&response).map_err(ProtocolError::from)?;
            conn.write_frame(&json).await?;
        }
    }

    /// Legacy line loop: `ping` in, `pong` out.
    ///
    /// Anything other than `ping` is logged as invalid and gets no response;
    /// the connection stays open awaiting the next line.
    async fn run_line(&self, conn: &mut Connection) -> ServerResult<()> {
        loop {
            let line = match conn.read_line().await? {
                Some(line) => line,
                None => {
                    debug!(peer = %conn.peer(), "Client disconnected");
                    return Ok(());
                }
            };

            if line == PING_LINE {
                let received_at = unix_millis();
                conn.write_line(PONG_LINE).await?;
                if let Some(log) = &self.request_log {
                    log.record(
                        &conn.peer().ip().to_string(),
                        0,
                        received_at,
                        unix_millis(),
                        "success",
                    );
                }
            } else {
                warn!(peer = %conn.peer(), message = %line, "Invalid message");
            }
        }
    }
}

/// Creates a connection handler closure for use with `TcpServer::run`.
pub fn make_connection_handler(
    handler: Arc<ConnectionHandler>,
) -> impl Fn(Connection) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
+ Send
+ Sync
+ 'static {
    move |conn| {
        let handler = handler.clone();
        Box::pin(async move {
            let peer = conn.peer();
            if let Err(e) = handler.handle_connection(conn).await {
                if e.is_disconnect() {
                    debug!(peer = %peer, error = %e, "Connection dropped");
                } else {
                    warn!(peer = %peer, error = %e, "Connection handler error");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::listener::TcpServer;
    use pingload_protocol::{ResponseStatus, encode_message};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn respond_to_ping_echoes_fields() {
        let handler = ConnectionHandler::new(WireMode::Framed);
        let request = Request::ping("c1", 5, 1000);
        match handler.respond_to(&request, 2000) {
            Response::Pong {
                sequence,
                original_timestamp,
                client_id,
                status,
                ..
            } => {
                assert_eq!(sequence, 5);
                assert_eq!(original_timestamp, 1000);
                assert_eq!(client_id, "c1");
                assert_eq!(status, ResponseStatus::Success);
            }
            other => panic!("expected Pong, got {other:?}"),
        }
    }

    #[test]
    fn respond_to_unknown_kind_acks() {
        let handler = ConnectionHandler::new(WireMode::Framed);
        let request = Request {
            kind: "STATUS".to_string(),
            data: "probe".to_string(),
            ..Request::ping("c1", 1, 0)
        };
        match handler.respond_to(&request, 2000) {
            Response::Generic {
                status, message, ..
            } => {
                assert_eq!(status, ResponseStatus::Success);
                assert_eq!(message, "processed: probe");
            }
            other => panic!("expected Generic, got {other:?}"),
        }
    }

    async fn spawn_server(wire: WireMode) -> std::net::SocketAddr {
        spawn_server_with(ConnectionHandler::new(wire)).await
    }

    async fn spawn_server_with(handler: ConnectionHandler) -> std::net::SocketAddr {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        let server = TcpServer::new(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            server
                .run(make_connection_handler(Arc::new(handler)))
                .await
                .ok();
        });
        addr
    }

    async fn write_framed(stream: &mut TcpStream, request: &Request) {
        let bytes = encode_message(request).unwrap();
        stream.write_all(&bytes).await.unwrap();
    }

    async fn read_framed(stream: &mut TcpStream) -> Response {
        let mut header = [0u8; 8];
        stream.read_exact(&mut header).await.unwrap();
        let len: usize = std::str::from_utf8(&header).unwrap().parse().unwrap();
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.unwrap();
        serde_json::from_slice(&payload).unwrap()
    }

    #[tokio::test]
    async fn ping_pong_exchange() {
        let addr = spawn_server(WireMode::Framed).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        // The canonical wire request shape.
        stream
            .write_all(
                b"00000073{\"type\":\"PING\",\"client_id\":\"c1\",\"timestamp\":1000,\"sequence\":1,\"data\":\"x\"}",
            )
            .await
            .unwrap();

        match read_framed(&mut stream).await {
            Response::Pong {
                sequence,
                original_timestamp,
                client_id,
                ..
            } => {
                assert_eq!(sequence, 1);
                assert_eq!(original_timestamp, 1000);
                assert_eq!(client_id, "c1");
            }
            other => panic!("expected Pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_keeps_connection_open() {
        let addr = spawn_server(WireMode::Framed).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"00000008not json").await.unwrap();
        match read_framed(&mut stream).await {
            Response::Generic { status, .. } => assert_eq!(status, ResponseStatus::Error),
            other => panic!("expected error response, got {other:?}"),
        }

        // The next well-formed request on the same connection still succeeds.
        write_framed(&mut stream, &Request::ping("c1", 2, 500)).await;
        match read_framed(&mut stream).await {
            Response::Pong { sequence, .. } => assert_eq!(sequence, 2),
            other => panic!("expected Pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn framing_error_closes_connection_without_response() {
        let addr = spawn_server(WireMode::Framed).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"garbage!").await.unwrap();

        // The server closes without sending anything back.
        let mut buf = [0u8; 1];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn concurrent_connections_keep_streams_ordered() {
        const CLIENTS: usize = 8;
        const MESSAGES: u64 = 20;

        let addr = spawn_server(WireMode::Framed).await;

        let tasks: Vec<_> = (0..CLIENTS)
            .map(|i| {
                tokio::spawn(async move {
                    let client_id = format!("client-{i}");
                    let mut stream = TcpStream::connect(addr).await.unwrap();
                    for seq in 1..=MESSAGES {
                        write_framed(&mut stream, &Request::ping(&client_id, seq, 1_000)).await;
                        match read_framed(&mut stream).await {
                            Response::Pong {
                                sequence,
                                client_id: echoed,
                                ..
                            } => {
                                assert_eq!(sequence, seq);
                                assert_eq!(echoed, client_id);
                            }
                            other => panic!("expected Pong, got {other:?}"),
                        }
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn line_mode_invalid_message_keeps_connection() {
        let addr = spawn_server(WireMode::Line).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        // Invalid line: logged, no response sent.
        stream.write_all(b"hello\n").await.unwrap();
        // A valid ping afterwards is still answered.
        stream.write_all(b"ping\n").await.unwrap();

        let mut response = [0u8; 5];
        stream.read_exact(&mut response).await.unwrap();
        assert_eq!(&response, b"pong\n");
    }

    #[tokio::test]
    async fn request_log_records_handled_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.csv");
        let handler = ConnectionHandler::with_request_log(
            WireMode::Framed,
            Arc::new(RequestLog::new(&path, 9000)),
        );
        let addr = spawn_server_with(handler).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_framed(&mut stream, &Request::ping("c1", 1, 1000)).await;
        let _ = read_framed(&mut stream).await;
        write_framed(&mut stream, &Request::ping("c1", 2, 1005)).await;
        let _ = read_framed(&mut stream).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp_request,"));
        assert!(lines[1].contains(",c1,1,"));
        assert!(lines[2].contains(",c1,2,"));
    }
}
