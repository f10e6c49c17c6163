//! ## minnessyn-telemetry::logging
//! **Structured logging with tracing and OpenTelemetry**
//!
//! ### Expectations:
//! - Negligible overhead: only session-lifecycle paths log, never the
//!   per-allocation hot path
//! - Structured fields over format strings
//!
//! ### Components:
//! - `metrics/`: Prometheus exporter fed from the runtime's counters
//! - `logging/`: tracing subscriber setup + lifecycle event helper

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    pub fn init() {
        Self::init_with_filter("info");
    }

    /// Installs the global subscriber, honoring `RUST_LOG` over `filter`.
    pub fn init_with_filter(filter: &str) {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .init()
    }

    /// Logs one session-lifecycle event (attach, viewer connect, detach).
    #[inline]
    pub fn log_lifecycle(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "session_lifecycle",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );
        span.in_scope(|| {
            tracing::info!(
                metadata = ?metadata,
                "Session lifecycle event"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_logging() {
        EventLogger::log_lifecycle("viewer_connected", vec![KeyValue::new("addr", "loopback")]);
        assert!(logs_contain("Session lifecycle event"));
    }
}
