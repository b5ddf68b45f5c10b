//! Length-prefixed message framing.
//!
//! A frame is an 8-byte ASCII decimal length prefix followed by exactly that
//! many payload bytes:
//!
//! ```text
//! +------------------+------------------+
//! | length (8 ASCII) |  payload         |
//! +------------------+------------------+
//! ```
//!
//! The prefix is zero-padded ("00000042"), carries no sign or whitespace,
//! and its value equals the byte length of the payload that follows.

use std::io::{Read, Write};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{ProtocolError, ProtocolResult};
use crate::{HEADER_LEN, MAX_PAYLOAD_SIZE};

/// Encodes a payload into a complete frame ready for transmission.
///
/// # Example
///
/// ```rust
/// use pingload_protocol::encode_frame;
///
/// let frame = encode_frame(b"ping").unwrap();
/// assert_eq!(&frame[..8], b"00000004");
/// assert_eq!(&frame[8..], b"ping");
/// ```
pub fn encode_frame(payload: &[u8]) -> ProtocolResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(HEADER_LEN + payload.len());
    buffer.extend_from_slice(format!("{:08}", payload.len()).as_bytes());
    buffer.extend_from_slice(payload);
    Ok(buffer)
}

/// Parses a frame header into the payload length.
///
/// Every byte must be an ASCII digit; anything else is a framing error, never
/// a truncated parse. Eight digits bound the value at [`MAX_PAYLOAD_SIZE`],
/// so no separate size check is needed on the decode side.
pub fn parse_header(header: &[u8; HEADER_LEN]) -> ProtocolResult<usize> {
    if !header.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::InvalidHeader(*header));
    }
    Ok(header
        .iter()
        .fold(0usize, |acc, b| acc * 10 + (b - b'0') as usize))
}

/// Serializes a message to JSON and wraps it in a frame.
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    encode_frame(&json)
}

/// Decodes a message from a complete frame (header + payload).
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::IncompleteFrame {
            expected: HEADER_LEN,
            received: data.len(),
        });
    }

    let header: [u8; HEADER_LEN] = data[..HEADER_LEN].try_into().expect("sliced to length");
    let len = parse_header(&header)?;

    if data.len() < HEADER_LEN + len {
        return Err(ProtocolError::IncompleteFrame {
            expected: HEADER_LEN + len,
            received: data.len(),
        });
    }

    let message = serde_json::from_slice(&data[HEADER_LEN..HEADER_LEN + len])?;
    Ok(message)
}

/// Reads frames from a byte stream.
pub struct FrameReader<R> {
    reader: R,
}

impl<R: Read> FrameReader<R> {
    /// Creates a new FrameReader wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads a single frame payload.
    ///
    /// Returns `Ok(None)` on a clean end of stream: EOF before a full header
    /// arrived. EOF in the middle of a payload is an abrupt disconnect and
    /// reported as [`ProtocolError::IncompleteFrame`].
    pub fn read_frame(&mut self) -> ProtocolResult<Option<Vec<u8>>> {
        let mut header = [0u8; HEADER_LEN];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let len = parse_header(&header)?;
        let mut payload = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.reader.read(&mut payload[filled..]) {
                Ok(0) => {
                    return Err(ProtocolError::IncompleteFrame {
                        expected: len,
                        received: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(payload))
    }

    /// Reads a single framed JSON message.
    pub fn read_message<T: DeserializeOwned>(&mut self) -> ProtocolResult<Option<T>> {
        match self.read_frame()? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Returns a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Unwraps this FrameReader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes frames to a byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a new FrameWriter wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a single frame.
    pub fn write_frame(&mut self, payload: &[u8]) -> ProtocolResult<()> {
        let data = encode_frame(payload)?;
        self.writer.write_all(&data)?;
        Ok(())
    }

    /// Writes a single framed JSON message.
    pub fn write_message<T: Serialize>(&mut self, message: &T) -> ProtocolResult<()> {
        let json = serde_json::to_vec(message)?;
        self.write_frame(&json)
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> ProtocolResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Unwraps this FrameWriter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
