//! Request and response types for the pingload protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire protocol selector shared by server and client.
///
/// `Framed` (length-prefixed JSON) is the canonical protocol; `Line` is the
/// legacy newline-delimited `ping`/`pong` exchange kept for old harnesses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMode {
    /// 8-digit length prefix + JSON payload.
    #[default]
    Framed,
    /// Bare `ping\n` / `pong\n` lines.
    Line,
}

impl FromStr for WireMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "framed" => Ok(Self::Framed),
            "line" => Ok(Self::Line),
            other => Err(format!("unknown wire mode '{other}' (expected 'framed' or 'line')")),
        }
    }
}

impl fmt::Display for WireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framed => f.write_str("framed"),
            Self::Line => f.write_str("line"),
        }
    }
}

/// A client request.
///
/// `type` is an open string rather than an enum: the server must accept any
/// value and treat everything that is not PING (case-insensitive) as a
/// generic message, so unknown kinds have to survive deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Message kind; `PING` (case-insensitive) gets the PONG treatment.
    #[serde(rename = "type")]
    pub kind: String,
    /// Logical client identifier, echoed back in PONG responses.
    #[serde(default)]
    pub client_id: String,
    /// Client send time, Unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    /// 1-based sequence number within the session.
    #[serde(default)]
    pub sequence: u64,
    /// Free-form payload, echoed in generic acknowledgements.
    #[serde(default)]
    pub data: String,
}

impl Request {
    /// Creates a PING request with the conventional data string.
    pub fn ping(client_id: impl Into<String>, sequence: u64, timestamp: i64) -> Self {
        let client_id = client_id.into();
        let data = format!("PING {} from client {}", sequence, client_id);
        Self {
            kind: "PING".to_string(),
            client_id,
            timestamp,
            sequence,
            data,
        }
    }

    /// Returns true if this request asks for the PING/PONG exchange.
    pub fn is_ping(&self) -> bool {
        self.kind.eq_ignore_ascii_case("PING")
    }

    /// Returns the client id, or "unknown" when the field was absent.
    pub fn client_id_or_unknown(&self) -> &str {
        if self.client_id.is_empty() {
            "unknown"
        } else {
            &self.client_id
        }
    }
}

/// Status carried in every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// A server response.
///
/// Two shapes share the tagged `type` field: `PONG` answers a PING and
/// echoes its correlation fields; `response` acknowledges everything else,
/// including payloads that failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Reply to a PING request.
    #[serde(rename = "PONG")]
    Pong {
        status: ResponseStatus,
        /// Server send time, Unix milliseconds.
        timestamp: i64,
        /// The request's `timestamp`, echoed for latency measurement.
        original_timestamp: i64,
        client_id: String,
        sequence: u64,
        message: String,
    },
    /// Generic acknowledgement or decode-error reply.
    #[serde(rename = "response")]
    Generic {
        status: ResponseStatus,
        timestamp: i64,
        message: String,
    },
}

impl Response {
    /// Builds the PONG reply for a PING request.
    pub fn pong(request: &Request, timestamp: i64) -> Self {
        Self::Pong {
            status: ResponseStatus::Success,
            timestamp,
            original_timestamp: request.timestamp,
            client_id: request.client_id.clone(),
            sequence: request.sequence,
            message: format!("PONG for {}", request.client_id_or_unknown()),
        }
    }

    /// Builds the generic acknowledgement for a non-PING request.
    pub fn ack(request: &Request, timestamp: i64) -> Self {
        Self::Generic {
            status: ResponseStatus::Success,
            timestamp,
            message: format!("processed: {}", request.data),
        }
    }

    /// Builds the generic error reply sent when a payload fails to decode.
    pub fn decode_error(timestamp: i64) -> Self {
        Self::Generic {
            status: ResponseStatus::Error,
            timestamp,
            message: "failed to decode message".to_string(),
        }
    }

    /// Returns the response status.
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::Pong { status, .. } | Self::Generic { status, .. } => *status,
        }
    }

    /// Returns true unless this is an error response.
    pub fn is_success(&self) -> bool {
        self.status() == ResponseStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_mode_parse() {
        assert_eq!("framed".parse::<WireMode>().unwrap(), WireMode::Framed);
        assert_eq!("line".parse::<WireMode>().unwrap(), WireMode::Line);
        assert!("json".parse::<WireMode>().is_err());
        assert_eq!(WireMode::Line.to_string(), "line");
    }

    #[test]
    fn request_serde_shape() {
        let request = Request::ping("c1", 1, 1000);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"type":"PING","client_id":"c1","timestamp":1000,"sequence":1,"data":"PING 1 from client c1"}"#
        );

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn request_accepts_wire_format_from_other_clients() {
        let json = r#"{"type":"PING","client_id":"c1","timestamp":1000,"sequence":1,"data":"x"}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        assert!(parsed.is_ping());
        assert_eq!(parsed.sequence, 1);
        assert_eq!(parsed.timestamp, 1000);
    }

    #[test]
    fn request_missing_fields_default() {
        let parsed: Request = serde_json::from_str(r#"{"type":"HELLO"}"#).unwrap();
        assert!(!parsed.is_ping());
        assert_eq!(parsed.client_id, "");
        assert_eq!(parsed.client_id_or_unknown(), "unknown");
        assert_eq!(parsed.sequence, 0);
    }

    #[test]
    fn ping_is_case_insensitive() {
        for kind in ["PING", "ping", "Ping", "pInG"] {
            let request = Request {
                kind: kind.to_string(),
                ..Request::ping("c1", 1, 0)
            };
            assert!(request.is_ping(), "kind {kind}");
        }
        let other = Request {
            kind: "STATUS".to_string(),
            ..Request::ping("c1", 1, 0)
        };
        assert!(!other.is_ping());
    }

    #[test]
    fn pong_echoes_request_fields() {
        let request = Request::ping("c1", 7, 123_456);
        let response = Response::pong(&request, 123_500);
        match &response {
            Response::Pong {
                status,
                timestamp,
                original_timestamp,
                client_id,
                sequence,
                message,
            } => {
                assert_eq!(*status, ResponseStatus::Success);
                assert_eq!(*timestamp, 123_500);
                assert_eq!(*original_timestamp, 123_456);
                assert_eq!(client_id, "c1");
                assert_eq!(*sequence, 7);
                assert!(message.contains("c1"));
            }
            _ => panic!("expected Pong"),
        }
        assert!(response.is_success());
    }

    #[test]
    fn pong_serde_shape() {
        let request = Request::ping("c1", 1, 1000);
        let json = serde_json::to_string(&Response::pong(&request, 2000)).unwrap();
        assert!(json.starts_with(r#"{"type":"PONG","status":"success""#));
        assert!(json.contains(r#""original_timestamp":1000"#));
        assert!(json.contains(r#""sequence":1"#));
    }

    #[test]
    fn generic_serde_shape() {
        let json = serde_json::to_string(&Response::decode_error(2000)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"response","status":"error","timestamp":2000,"message":"failed to decode message"}"#
        );

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(!parsed.is_success());
    }

    #[test]
    fn ack_echoes_data() {
        let request = Request {
            kind: "STATUS".to_string(),
            client_id: "c1".to_string(),
            timestamp: 0,
            sequence: 0,
            data: "hello".to_string(),
        };
        match Response::ack(&request, 10) {
            Response::Generic {
                status, message, ..
            } => {
                assert_eq!(status, ResponseStatus::Success);
                assert_eq!(message, "processed: hello");
            }
            _ => panic!("expected Generic"),
        }
    }

    #[test]
    fn response_roundtrip() {
        let request = Request::ping("c9", 42, 999);
        let pong = Response::pong(&request, 1042);
        let json = serde_json::to_string(&pong).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pong);
    }
}
