//! ## minnessyn-telemetry::metrics
//! **Prometheus exporter fed from the runtime's diagnostic counters**
//!
//! The session ticks relaxed atomics on its hot paths; `sync_from` is
//! called from the host's control thread (typically next to the queue
//! pump) to roll those counters forward into the registry.

use prometheus::{IntCounter, Registry};

use minnessyn_core::stats::StatsSnapshot;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub strings_defined: IntCounter,
    pub stacks_defined: IntCounter,
    pub frames_sealed: IntCounter,
    pub frames_dropped: IntCounter,
    pub records_dropped: IntCounter,
    pub bytes_drained: IntCounter,
    pub live_evictions: IntCounter,
    pub protocol_violations: IntCounter,
    pub untracked_frees: IntCounter,
    last: StatsSnapshot,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();

        let strings_defined = IntCounter::new(
            "minnessyn_strings_defined_total",
            "Unique strings interned this session",
        )
        .unwrap();
        let stacks_defined = IntCounter::new(
            "minnessyn_stacks_defined_total",
            "Unique stack traces defined this session",
        )
        .unwrap();
        let frames_sealed = IntCounter::new(
            "minnessyn_frames_sealed_total",
            "Frames closed and queued for the viewer",
        )
        .unwrap();
        let frames_dropped = IntCounter::new(
            "minnessyn_frames_dropped_total",
            "Frames discarded because the viewer fell behind",
        )
        .unwrap();
        let records_dropped = IntCounter::new(
            "minnessyn_records_dropped_total",
            "Records discarded because the staging buffer was full",
        )
        .unwrap();
        let bytes_drained = IntCounter::new(
            "minnessyn_bytes_drained_total",
            "Bytes handed to the viewer transport",
        )
        .unwrap();
        let live_evictions = IntCounter::new(
            "minnessyn_live_evictions_total",
            "Live allocations the index lost track of",
        )
        .unwrap();
        let protocol_violations = IntCounter::new(
            "minnessyn_protocol_violations_total",
            "Double allocs and stack id reuse mismatches",
        )
        .unwrap();
        let untracked_frees = IntCounter::new(
            "minnessyn_untracked_frees_total",
            "Frees of addresses the runtime never saw allocated",
        )
        .unwrap();

        for counter in [
            &strings_defined,
            &stacks_defined,
            &frames_sealed,
            &frames_dropped,
            &records_dropped,
            &bytes_drained,
            &live_evictions,
            &protocol_violations,
            &untracked_frees,
        ] {
            registry.register(Box::new(counter.clone())).unwrap();
        }

        Self {
            registry,
            strings_defined,
            stacks_defined,
            frames_sealed,
            frames_dropped,
            records_dropped,
            bytes_drained,
            live_evictions,
            protocol_violations,
            untracked_frees,
            last: StatsSnapshot::default(),
        }
    }

    /// Rolls the registry forward to `snap`. Counters are monotonic per
    /// session, so only the delta since the previous sync is added.
    pub fn sync_from(&mut self, snap: &StatsSnapshot) {
        self.strings_defined
            .inc_by(snap.strings_defined.saturating_sub(self.last.strings_defined));
        self.stacks_defined
            .inc_by(snap.stacks_defined.saturating_sub(self.last.stacks_defined));
        self.frames_sealed
            .inc_by(snap.frames_sealed.saturating_sub(self.last.frames_sealed));
        self.frames_dropped
            .inc_by(snap.frames_dropped.saturating_sub(self.last.frames_dropped));
        self.records_dropped
            .inc_by(snap.records_dropped.saturating_sub(self.last.records_dropped));
        self.bytes_drained
            .inc_by(snap.bytes_drained.saturating_sub(self.last.bytes_drained));
        self.live_evictions
            .inc_by(snap.live_evictions.saturating_sub(self.last.live_evictions));
        let violations = snap.double_allocs + snap.stack_mismatches;
        let last_violations = self.last.double_allocs + self.last.stack_mismatches;
        self.protocol_violations
            .inc_by(violations.saturating_sub(last_violations));
        self.untracked_frees
            .inc_by(snap.untracked_frees.saturating_sub(self.last.untracked_frees));
        self.last = *snap;
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_is_delta_based() {
        let mut recorder = MetricsRecorder::new();
        let mut snap = StatsSnapshot {
            frames_sealed: 5,
            untracked_frees: 2,
            ..Default::default()
        };
        recorder.sync_from(&snap);
        assert_eq!(recorder.frames_sealed.get(), 5);

        snap.frames_sealed = 7;
        recorder.sync_from(&snap);
        recorder.sync_from(&snap);
        assert_eq!(recorder.frames_sealed.get(), 7);
        assert_eq!(recorder.untracked_frees.get(), 2);
    }

    #[test]
    fn violations_fold_both_kinds() {
        let mut recorder = MetricsRecorder::new();
        let snap = StatsSnapshot {
            double_allocs: 3,
            stack_mismatches: 4,
            ..Default::default()
        };
        recorder.sync_from(&snap);
        assert_eq!(recorder.protocol_violations.get(), 7);
    }

    #[test]
    fn gather_renders_registered_series() {
        let mut recorder = MetricsRecorder::new();
        recorder.sync_from(&StatsSnapshot {
            frames_sealed: 1,
            ..Default::default()
        });
        let rendered = recorder.gather_metrics().unwrap();
        assert!(rendered.contains("minnessyn_frames_sealed_total"));
    }
}
