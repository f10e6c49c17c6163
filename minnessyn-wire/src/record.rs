//! ## minnessyn-wire::record
//! **Tagged, length-prefixed event records**
//!
//! Every record is `tag: u8`, `payload_len: u32` (little endian), then a
//! fixed payload layout per tag. Definitions carry their raw bytes once;
//! every later mention is an 8-byte id reference. Encoding is single-pass
//! into caller-provided space.

use crate::error::WireError;

/// Bytes of the `tag + payload_len` record header.
pub const RECORD_HEADER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    StringDefine = 0x01,
    StringRef = 0x02,
    StackDefine = 0x03,
    StackRef = 0x04,
    Alloc = 0x05,
    Free = 0x06,
    FrameEnd = 0x07,
    DropMark = 0x08,
    Evicted = 0x09,
    Violation = 0x0a,
    TableFull = 0x0b,
}

impl Tag {
    pub fn from_u8(raw: u8) -> Result<Self, WireError> {
        Ok(match raw {
            0x01 => Tag::StringDefine,
            0x02 => Tag::StringRef,
            0x03 => Tag::StackDefine,
            0x04 => Tag::StackRef,
            0x05 => Tag::Alloc,
            0x06 => Tag::Free,
            0x07 => Tag::FrameEnd,
            0x08 => Tag::DropMark,
            0x09 => Tag::Evicted,
            0x0a => Tag::Violation,
            0x0b => Tag::TableFull,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

/// Protocol-violation categories carried by [`Record::Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ViolationKind {
    /// Same address allocated twice without an intervening free.
    DoubleAlloc = 1,
    /// Stack id reasserted with different content.
    StackReuseMismatch = 2,
}

/// Which intern table a [`Record::TableFull`] marker refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TableKind {
    Strings = 1,
    Stacks = 2,
}

/// One decoded or to-be-encoded wire record. Payload slices borrow from
/// the underlying stream buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    StringDefine { id: u64, bytes: &'a [u8] },
    StringRef { id: u64 },
    StackDefine { id: u64, bytes: &'a [u8] },
    StackRef { id: u64 },
    Alloc { addr: u64, size: u64, region_id: u64, stack: u64 },
    Free { addr: u64 },
    FrameEnd { seq: u64 },
    /// Cumulative totals of frames/records the producer had to discard.
    DropMark { frames: u64, records: u64 },
    /// The live index lost track of this address to make room.
    Evicted { addr: u64 },
    Violation { kind: ViolationKind, subject: u64, detail: u64 },
    TableFull { table: TableKind },
}

impl Record<'_> {
    pub fn tag(&self) -> Tag {
        match self {
            Record::StringDefine { .. } => Tag::StringDefine,
            Record::StringRef { .. } => Tag::StringRef,
            Record::StackDefine { .. } => Tag::StackDefine,
            Record::StackRef { .. } => Tag::StackRef,
            Record::Alloc { .. } => Tag::Alloc,
            Record::Free { .. } => Tag::Free,
            Record::FrameEnd { .. } => Tag::FrameEnd,
            Record::DropMark { .. } => Tag::DropMark,
            Record::Evicted { .. } => Tag::Evicted,
            Record::Violation { .. } => Tag::Violation,
            Record::TableFull { .. } => Tag::TableFull,
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            Record::StringDefine { bytes, .. } | Record::StackDefine { bytes, .. } => {
                8 + bytes.len()
            }
            Record::StringRef { .. }
            | Record::StackRef { .. }
            | Record::Free { .. }
            | Record::FrameEnd { .. }
            | Record::Evicted { .. } => 8,
            Record::Alloc { .. } => 32,
            Record::DropMark { .. } => 16,
            Record::Violation { .. } => 17,
            Record::TableFull { .. } => 1,
        }
    }

    /// Total encoded size, header included.
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN + self.payload_len()
    }

    /// Encodes the record into `out`, which must be exactly
    /// [`encoded_len`](Self::encoded_len) bytes. Returns the bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> usize {
        debug_assert_eq!(out.len(), self.encoded_len());
        out[0] = self.tag() as u8;
        out[1..5].copy_from_slice(&(self.payload_len() as u32).to_le_bytes());

        let payload = &mut out[RECORD_HEADER_LEN..];
        match *self {
            Record::StringDefine { id, bytes } | Record::StackDefine { id, bytes } => {
                payload[..8].copy_from_slice(&id.to_le_bytes());
                payload[8..].copy_from_slice(bytes);
            }
            Record::StringRef { id } | Record::StackRef { id } => {
                payload.copy_from_slice(&id.to_le_bytes());
            }
            Record::Alloc {
                addr,
                size,
                region_id,
                stack,
            } => {
                payload[..8].copy_from_slice(&addr.to_le_bytes());
                payload[8..16].copy_from_slice(&size.to_le_bytes());
                payload[16..24].copy_from_slice(&region_id.to_le_bytes());
                payload[24..32].copy_from_slice(&stack.to_le_bytes());
            }
            Record::Free { addr } | Record::Evicted { addr } => {
                payload.copy_from_slice(&addr.to_le_bytes());
            }
            Record::FrameEnd { seq } => {
                payload.copy_from_slice(&seq.to_le_bytes());
            }
            Record::DropMark { frames, records } => {
                payload[..8].copy_from_slice(&frames.to_le_bytes());
                payload[8..16].copy_from_slice(&records.to_le_bytes());
            }
            Record::Violation {
                kind,
                subject,
                detail,
            } => {
                payload[0] = kind as u8;
                payload[1..9].copy_from_slice(&subject.to_le_bytes());
                payload[9..17].copy_from_slice(&detail.to_le_bytes());
            }
            Record::TableFull { table } => {
                payload[0] = table as u8;
            }
        }
        self.encoded_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(record: Record<'_>) {
        let mut buf = vec![0u8; record.encoded_len()];
        assert_eq!(record.encode_into(&mut buf), buf.len());
        let decoded = crate::decode::RecordReader::new(&buf)
            .next()
            .expect("one record")
            .expect("decodes");
        assert_eq!(decoded, record);
    }

    #[test]
    fn every_tag_roundtrips() {
        roundtrip(Record::StringDefine {
            id: 1,
            bytes: b"main.rs",
        });
        roundtrip(Record::StringRef { id: 1 });
        roundtrip(Record::StackDefine {
            id: 42,
            bytes: &[1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0],
        });
        roundtrip(Record::StackRef { id: 42 });
        roundtrip(Record::Alloc {
            addr: 0x1000,
            size: 128,
            region_id: 7,
            stack: 42,
        });
        roundtrip(Record::Free { addr: 0x1000 });
        roundtrip(Record::FrameEnd { seq: 3 });
        roundtrip(Record::DropMark {
            frames: 2,
            records: 17,
        });
        roundtrip(Record::Evicted { addr: 0xbeef });
        roundtrip(Record::Violation {
            kind: ViolationKind::DoubleAlloc,
            subject: 0x2000,
            detail: 64,
        });
        roundtrip(Record::TableFull {
            table: TableKind::Strings,
        });
    }

    #[test]
    fn header_is_tag_then_le_length() {
        let record = Record::StringDefine {
            id: 9,
            bytes: b"abc",
        };
        let mut buf = vec![0u8; record.encoded_len()];
        record.encode_into(&mut buf);
        assert_eq!(buf[0], Tag::StringDefine as u8);
        assert_eq!(u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]), 11);
        assert_eq!(&buf[13..], b"abc");
    }
}
