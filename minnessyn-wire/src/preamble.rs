//! Stream preamble written once per viewer connection, before any frame.

use crate::error::WireError;

/// Stream magic identifying a minnessyn producer.
pub const STREAM_MAGIC: [u8; 4] = *b"MSYN";

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

pub const PREAMBLE_LEN: usize = 6;

/// The encoded preamble for the current protocol version.
pub const PREAMBLE: [u8; PREAMBLE_LEN] = {
    let v = PROTOCOL_VERSION.to_le_bytes();
    [
        STREAM_MAGIC[0],
        STREAM_MAGIC[1],
        STREAM_MAGIC[2],
        STREAM_MAGIC[3],
        v[0],
        v[1],
    ]
};

/// Validates the stream head and returns the producer's protocol version
/// together with the remaining record bytes.
pub fn read_preamble(data: &[u8]) -> Result<(u16, &[u8]), WireError> {
    if data.len() < PREAMBLE_LEN {
        return Err(WireError::Truncated);
    }
    let magic = [data[0], data[1], data[2], data[3]];
    if magic != STREAM_MAGIC {
        return Err(WireError::BadMagic(magic));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    Ok((version, &data[PREAMBLE_LEN..]))
}
