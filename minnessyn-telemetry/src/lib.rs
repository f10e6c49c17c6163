//! # Minnessyn Telemetry and Monitoring
//!
//! Crate for the runtime's own logging and metrics. The hot event paths
//! only tick atomic counters; this crate is where the host's control
//! thread turns those counters into Prometheus series and where tracing
//! gets initialized.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
