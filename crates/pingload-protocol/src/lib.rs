//! Wire framing and request/response types for pingload.
//!
//! This crate defines the protocol spoken between the pingload client and
//! server over a TCP stream.
//!
//! # Protocol Overview
//!
//! Messages are sent as length-prefixed JSON:
//! - 8 bytes: payload length as zero-padded ASCII decimal digits
//! - N bytes: JSON payload
//!
//! ```text
//! +------------------+------------------+
//! | length (8 ASCII) |  JSON payload    |
//! +------------------+------------------+
//! ```
//!
//! The prefix is exactly eight ASCII digits with no sign or whitespace, so
//! the largest representable payload is 99 999 999 bytes.
//!
//! A legacy line mode ships alongside the framed protocol: requests are the
//! bare line `ping\n` and responses the line `pong\n`, newline-delimited
//! with no length prefix. [`WireMode`] selects between the two.
//!
//! # Example
//!
//! ```rust
//! use pingload_protocol::{Request, encode_message, decode_message};
//!
//! let request = Request::ping("client-1", 1, 1000);
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Request = decode_message(&bytes).unwrap();
//! assert_eq!(decoded.sequence, 1);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{
    FrameReader, FrameWriter, decode_message, encode_frame, encode_message, parse_header,
};
pub use types::{Request, Response, ResponseStatus, WireMode};

/// Length of the frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Maximum payload size expressible by an 8-digit decimal prefix.
pub const MAX_PAYLOAD_SIZE: usize = 99_999_999;

/// Request line of the legacy line mode.
pub const PING_LINE: &str = "ping";

/// Response line of the legacy line mode.
pub const PONG_LINE: &str = "pong";
