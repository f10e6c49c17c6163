//! # minnessyn-wire
//!
//! The viewer wire protocol: length-prefixed tagged records grouped into
//! frames, preceded by a stream preamble. The encoder side writes into
//! caller-provided space and never allocates; the decoder side is for
//! viewers and tests, where allocation is fine.

pub mod decode;
pub mod error;
pub mod preamble;
pub mod record;

pub use decode::{split_frames, Frame, RecordReader};
pub use error::WireError;
pub use preamble::{read_preamble, PREAMBLE, PREAMBLE_LEN, PROTOCOL_VERSION, STREAM_MAGIC};
pub use record::{Record, TableKind, Tag, ViolationKind, RECORD_HEADER_LEN};
