//! Client session driver.
//!
//! A session is one connection's full sequence of request/response round
//! trips: connect, send N requests, validate N responses, close, report.
//! The two exchange modes (strict turn-taking and pipelined) and the two
//! wire modes (framed JSON and legacy lines) all run through the same
//! driver; they are configuration, not separate code paths.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use pingload_core::{SessionStatus, unix_millis};
use pingload_protocol::{
    HEADER_LEN, PING_LINE, PONG_LINE, Request, Response, ResponseStatus, WireMode, encode_message,
    parse_header,
};

/// How requests and responses are interleaved within a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeMode {
    /// One request out, one response in, strictly alternating.
    #[default]
    Strict,
    /// All requests sent back-to-back, then all responses drained.
    /// Measures pipelined throughput.
    Pipelined,
}

/// Configuration of one client session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Logical client identifier carried in requests.
    pub client_id: String,
    /// Number of round trips to perform; zero is a valid (empty) session.
    pub messages: u32,
    /// Wire protocol.
    pub wire: WireMode,
    /// Exchange mode.
    pub exchange: ExchangeMode,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Whole-session timeout; unbounded when `None`.
    pub session_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Creates a session config with defaults for everything but the target.
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            messages: 1,
            wire: WireMode::Framed,
            exchange: ExchangeMode::Strict,
            connect_timeout: Duration::from_secs(5),
            session_timeout: None,
        }
    }

    /// Builder: set the message count.
    pub fn with_messages(mut self, messages: u32) -> Self {
        self.messages = messages;
        self
    }

    /// Builder: set the wire mode.
    pub fn with_wire(mut self, wire: WireMode) -> Self {
        self.wire = wire;
        self
    }

    /// Builder: set the exchange mode.
    pub fn with_exchange(mut self, exchange: ExchangeMode) -> Self {
        self.exchange = exchange;
        self
    }

    /// Builder: set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set the whole-session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }
}

/// Outcome of one session, ready to become a result log row.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Terminal status.
    pub status: SessionStatus,
    /// Error detail; empty on success.
    pub error: String,
    /// Session start time.
    pub started_at: DateTime<Utc>,
    /// Session end time.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: f64,
}

impl SessionOutcome {
    /// Returns true for a fully successful session.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Runs one session to completion.
///
/// Never retries: a connect failure, transport error or bad response is
/// terminal for the session. The connection is closed on every exit path.
pub async fn run_session(config: &SessionConfig) -> SessionOutcome {
    let started_at = Utc::now();
    let start = Instant::now();

    let (status, error) = drive(config).await;

    let finished_at = Utc::now();
    SessionOutcome {
        status,
        error,
        started_at,
        finished_at,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

type ExchangeError = (SessionStatus, String);

async fn drive(config: &SessionConfig) -> (SessionStatus, String) {
    let addr = format!("{}:{}", config.host, config.port);

    let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr)).await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return (
                SessionStatus::ConnectError,
                format!("failed to connect to {}: {}", addr, e),
            );
        }
        Err(_) => {
            return (
                SessionStatus::ConnectError,
                format!(
                    "connection to {} timed out after {}s",
                    addr,
                    config.connect_timeout.as_secs()
                ),
            );
        }
    };
    debug!(addr = %addr, client_id = %config.client_id, "Connected");

    let mut stream = BufReader::new(stream);

    let result = match config.session_timeout {
        Some(limit) => match tokio::time::timeout(limit, exchange(config, &mut stream)).await {
            Ok(result) => result,
            Err(_) => Err((
                SessionStatus::RecvError,
                format!("session timed out after {}s", limit.as_secs()),
            )),
        },
        None => exchange(config, &mut stream).await,
    };

    // The stream drops here, closing the connection on every exit path.
    match result {
        Ok(()) => (SessionStatus::Success, String::new()),
        Err((status, error)) => (status, error),
    }
}

/// Performs the configured number of round trips.
async fn exchange(
    config: &SessionConfig,
    stream: &mut BufReader<TcpStream>,
) -> Result<(), ExchangeError> {
    let total = config.messages as u64;
    match config.exchange {
        ExchangeMode::Strict => {
            for seq in 1..=total {
                let sent = send_one(config, stream, seq).await?;
                recv_one(config, stream, seq, sent).await?;
            }
        }
        ExchangeMode::Pipelined => {
            let mut stamps = Vec::with_capacity(config.messages as usize);
            for seq in 1..=total {
                stamps.push(send_one(config, stream, seq).await?);
            }
            for (received, &sent) in stamps.iter().enumerate() {
                let seq = received as u64 + 1;
                recv_one(config, stream, seq, sent)
                    .await
                    .map_err(|(status, error)| {
                        if status == SessionStatus::RecvError {
                            (
                                status,
                                format!(
                                    "received {} of {} responses: {}",
                                    received, total, error
                                ),
                            )
                        } else {
                            (status, error)
                        }
                    })?;
            }
        }
    }
    Ok(())
}

/// Sends one request and returns the timestamp it carried.
async fn send_one(
    config: &SessionConfig,
    stream: &mut BufReader<TcpStream>,
    seq: u64,
) -> Result<i64, ExchangeError> {
    let timestamp = unix_millis();
    let bytes = match config.wire {
        WireMode::Framed => encode_message(&Request::ping(&config.client_id, seq, timestamp))
            .map_err(|e| (SessionStatus::SendError, e.to_string()))?,
        WireMode::Line => format!("{}\n", PING_LINE).into_bytes(),
    };
    stream
        .get_mut()
        .write_all(&bytes)
        .await
        .map_err(|e| (SessionStatus::SendError, e.to_string()))?;
    Ok(timestamp)
}

/// Reads and validates one response.
async fn recv_one(
    config: &SessionConfig,
    stream: &mut BufReader<TcpStream>,
    seq: u64,
    sent_timestamp: i64,
) -> Result<(), ExchangeError> {
    match config.wire {
        WireMode::Framed => recv_pong(stream, seq, sent_timestamp).await,
        WireMode::Line => recv_pong_line(stream).await,
    }
}

async fn recv_pong(
    stream: &mut BufReader<TcpStream>,
    seq: u64,
    sent_timestamp: i64,
) -> Result<(), ExchangeError> {
    let mut header = [0u8; HEADER_LEN];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| (SessionStatus::RecvError, e.to_string()))?;

    // A corrupt prefix means whatever follows cannot be trusted; treat it
    // as a failed validation, the same bucket as an undecodable payload.
    let len = parse_header(&header)
        .map_err(|e| (SessionStatus::ValidationFailed, e.to_string()))?;

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| (SessionStatus::RecvError, e.to_string()))?;

    let response: Response = serde_json::from_slice(&payload).map_err(|_| {
        (
            SessionStatus::ValidationFailed,
            format!(
                "undecodable response: {}",
                String::from_utf8_lossy(&payload)
            ),
        )
    })?;

    match &response {
        Response::Pong {
            status,
            sequence,
            original_timestamp,
            ..
        } if *status == ResponseStatus::Success
            && *sequence == seq
            && *original_timestamp == sent_timestamp =>
        {
            Ok(())
        }
        _ => Err((
            SessionStatus::ValidationFailed,
            format!(
                "unexpected response for sequence {}: {}",
                seq,
                serde_json::to_string(&response).unwrap_or_default()
            ),
        )),
    }
}

async fn recv_pong_line(stream: &mut BufReader<TcpStream>) -> Result<(), ExchangeError> {
    let mut line = String::new();
    let n = stream
        .read_line(&mut line)
        .await
        .map_err(|e| (SessionStatus::RecvError, e.to_string()))?;
    if n == 0 {
        return Err((
            SessionStatus::RecvError,
            "connection closed by server".to_string(),
        ));
    }
    let line = line.trim_end_matches(['\n', '\r']);
    if line == PONG_LINE {
        Ok(())
    } else {
        Err((SessionStatus::ValidationFailed, line.to_string()))
    }
}
