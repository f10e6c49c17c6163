//! # minnessyn-core
//!
//! Foundation layer for the allocation-instrumentation runtime.
//! Everything in this crate lives inside one caller-supplied buffer and
//! never touches the host's allocator after partitioning.
//!
//! ### Expectations (Production):
//! - Zero heap allocations on every event path after `partition`
//! - Bounded latency on the host's allocation hot path
//! - Fine-grained synchronization (sharded locks, SPSC ring)
//!
//! ### Key Submodules:
//! - `arena`: carve-once partitioning of the caller's resource buffer
//! - `intern`: deduplicating string/stack tables with stable ids
//! - `live`: address-keyed index of currently-live allocations
//! - `spool`: frame staging buffer and outbound SPSC frame ring
//! - `stats`: relaxed atomic diagnostic counters

pub mod arena;
pub mod error;
pub mod intern;
pub mod live;
pub mod spool;
pub mod stats;

pub mod prelude {
    pub use crate::arena::*;
    pub use crate::error::*;
    pub use crate::intern::*;
    pub use crate::live::*;
    pub use crate::spool::*;
    pub use crate::stats::*;
}

pub use arena::{min_required_memory, Partitions, RegionLayout};
pub use error::CoreError;
