// Error types for the session transport
// Everything that can go wrong between a byte stream and a decoded player event

use std::io;

/// Errors raised while reading or writing protocol data.
///
/// Any of these during a running session is treated as a lost connection by
/// the receive loop and by the listener proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The underlying stream failed, including end-of-stream.
    #[error("stream error: {0}")]
    Io(#[from] io::Error),

    /// A tag byte outside the defined event set.
    #[error("unknown event tag {0}")]
    UnknownTag(u8),

    /// An exit event carried a reason code we do not know.
    #[error("unknown exit reason {0}")]
    UnknownExitReason(i32),

    /// A string does not fit the two byte length prefix.
    #[error("string of {0} encoded bytes exceeds 65535")]
    StringTooLong(usize),

    /// The bytes of a length-prefixed string are not valid modified UTF-8.
    #[error("malformed string data")]
    MalformedString,
}

impl ProtocolError {
    /// True when the peer closed the stream cleanly.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
