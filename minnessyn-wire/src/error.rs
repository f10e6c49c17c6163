use thiserror::Error;

/// Errors that can occur while decoding a record stream.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("insufficient data for a complete record")]
    Truncated,
    #[error("unknown record tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("payload length {got} invalid for tag {tag:?}")]
    BadPayload { tag: crate::record::Tag, got: usize },
    #[error("bad stream magic 0x{}", hex::encode(.0))]
    BadMagic([u8; 4]),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u16),
    #[error("stream ends inside an unterminated frame")]
    UnterminatedFrame,
}
