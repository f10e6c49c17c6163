//! Core runtime sizing parameters.
//!
//! The stack-trace byte budget is the single knob everything else scales
//! from: intern-table capacities, the live-allocation index and the
//! outbound ring are all carved proportionally to it out of the one
//! caller-supplied buffer.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sizing for the instrumentation session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RuntimeConfig {
    /// Byte budget reserved for deduplicated stack-trace content.
    #[validate(range(min = 4096, message = "stack-trace budget below 4 KiB"))]
    pub bytes_for_stacktrace: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bytes_for_stacktrace: 64 * 1024,
        }
    }
}
