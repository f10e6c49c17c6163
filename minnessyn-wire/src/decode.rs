//! ## minnessyn-wire::decode
//! **Zero-copy record and frame decoding for viewers and tests**
//!
//! `RecordReader` walks a byte slice record by record without copying
//! payloads; `split_frames` additionally groups records at frame-end
//! boundaries the way a viewer consumes them.

use bytes::Bytes;

use crate::error::WireError;
use crate::record::{Record, TableKind, Tag, ViolationKind, RECORD_HEADER_LEN};

fn read_u64(payload: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&payload[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn decode_payload<'a>(tag: Tag, payload: &'a [u8]) -> Result<Record<'a>, WireError> {
    let bad = || WireError::BadPayload {
        tag,
        got: payload.len(),
    };
    let record = match tag {
        Tag::StringDefine | Tag::StackDefine => {
            if payload.len() < 8 {
                return Err(bad());
            }
            let id = read_u64(payload, 0);
            let bytes = &payload[8..];
            if tag == Tag::StringDefine {
                Record::StringDefine { id, bytes }
            } else {
                Record::StackDefine { id, bytes }
            }
        }
        Tag::StringRef | Tag::StackRef | Tag::Free | Tag::FrameEnd | Tag::Evicted => {
            if payload.len() != 8 {
                return Err(bad());
            }
            let value = read_u64(payload, 0);
            match tag {
                Tag::StringRef => Record::StringRef { id: value },
                Tag::StackRef => Record::StackRef { id: value },
                Tag::Free => Record::Free { addr: value },
                Tag::FrameEnd => Record::FrameEnd { seq: value },
                _ => Record::Evicted { addr: value },
            }
        }
        Tag::Alloc => {
            if payload.len() != 32 {
                return Err(bad());
            }
            Record::Alloc {
                addr: read_u64(payload, 0),
                size: read_u64(payload, 8),
                region_id: read_u64(payload, 16),
                stack: read_u64(payload, 24),
            }
        }
        Tag::DropMark => {
            if payload.len() != 16 {
                return Err(bad());
            }
            Record::DropMark {
                frames: read_u64(payload, 0),
                records: read_u64(payload, 8),
            }
        }
        Tag::Violation => {
            if payload.len() != 17 {
                return Err(bad());
            }
            let kind = match payload[0] {
                1 => ViolationKind::DoubleAlloc,
                2 => ViolationKind::StackReuseMismatch,
                _ => return Err(bad()),
            };
            Record::Violation {
                kind,
                subject: read_u64(payload, 1),
                detail: read_u64(payload, 9),
            }
        }
        Tag::TableFull => {
            if payload.len() != 1 {
                return Err(bad());
            }
            let table = match payload[0] {
                1 => TableKind::Strings,
                2 => TableKind::Stacks,
                _ => return Err(bad()),
            };
            Record::TableFull { table }
        }
    };
    Ok(record)
}

/// Iterates the records of a raw stream slice (preamble already consumed).
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Byte offset of the next unread record.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<Record<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        if rest.len() < RECORD_HEADER_LEN {
            self.pos = self.data.len();
            return Some(Err(WireError::Truncated));
        }
        let tag = match Tag::from_u8(rest[0]) {
            Ok(tag) => tag,
            Err(e) => {
                self.pos = self.data.len();
                return Some(Err(e));
            }
        };
        let len = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
        if rest.len() < RECORD_HEADER_LEN + len {
            self.pos = self.data.len();
            return Some(Err(WireError::Truncated));
        }
        let payload = &rest[RECORD_HEADER_LEN..RECORD_HEADER_LEN + len];
        self.pos += RECORD_HEADER_LEN + len;
        Some(decode_payload(tag, payload))
    }
}

/// One decoded frame: its sequence number and the records it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub seq: u64,
    pub records: Vec<Record<'a>>,
}

/// Splits a record stream (preamble already consumed) into frames at
/// frame-end boundaries. Fails if the stream ends inside a frame.
pub fn split_frames(data: &Bytes) -> Result<Vec<Frame<'_>>, WireError> {
    let mut frames = Vec::new();
    let mut open: Vec<Record<'_>> = Vec::new();
    for record in RecordReader::new(data) {
        match record? {
            Record::FrameEnd { seq } => {
                frames.push(Frame {
                    seq,
                    records: std::mem::take(&mut open),
                });
            }
            other => open.push(other),
        }
    }
    if !open.is_empty() {
        return Err(WireError::UnterminatedFrame);
    }
    Ok(frames)
}
