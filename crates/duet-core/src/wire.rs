//! Wire encoding.
//!
//! The protocol has no framing: every payload is raw UTF-8 text written in a
//! single call. The first payload on a connection is the sender's nickname,
//! every later one is a chat message.

use bytes::Bytes;

/// Upper bound on bytes taken from the stream per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Encode text for the wire.
pub fn encode_text(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

/// Decode a received payload.
///
/// Callers pass exactly the bytes a read produced, never the whole receive
/// buffer. Invalid UTF-8 sequences become U+FFFD.
pub fn decode_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}
