//! Observability configuration for the runtime's own diagnostics.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TelemetryConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[validate(length(min = 1))]
    pub log_filter: String,

    /// Whether log lines carry the originating thread name.
    pub log_thread_names: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            log_thread_names: true,
        }
    }
}
