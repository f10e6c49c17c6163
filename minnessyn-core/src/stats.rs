//! ## minnessyn-core::stats
//! **Diagnostic counters for the instrumentation runtime itself**
//!
//! Ticked with relaxed atomics from the event hot paths; read as a
//! consistent-enough snapshot from the host's control thread. The
//! counters are how capacity degradation and protocol violations stay
//! observable without ever blocking or allocating.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct RuntimeStats {
    strings_defined: AtomicU64,
    stacks_defined: AtomicU64,
    frames_sealed: AtomicU64,
    frames_dropped: AtomicU64,
    records_dropped: AtomicU64,
    frames_drained: AtomicU64,
    bytes_drained: AtomicU64,
    live_evictions: AtomicU64,
    double_allocs: AtomicU64,
    stack_mismatches: AtomicU64,
    untracked_frees: AtomicU64,
    string_table_full: AtomicBool,
    stack_table_full: AtomicBool,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub strings_defined: u64,
    pub stacks_defined: u64,
    pub frames_sealed: u64,
    pub frames_dropped: u64,
    pub records_dropped: u64,
    pub frames_drained: u64,
    pub bytes_drained: u64,
    pub live_evictions: u64,
    pub double_allocs: u64,
    pub stack_mismatches: u64,
    pub untracked_frees: u64,
    pub string_table_full: bool,
    pub stack_table_full: bool,
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self {
            strings_defined: AtomicU64::new(0),
            stacks_defined: AtomicU64::new(0),
            frames_sealed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            frames_drained: AtomicU64::new(0),
            bytes_drained: AtomicU64::new(0),
            live_evictions: AtomicU64::new(0),
            double_allocs: AtomicU64::new(0),
            stack_mismatches: AtomicU64::new(0),
            untracked_frees: AtomicU64::new(0),
            string_table_full: AtomicBool::new(false),
            stack_table_full: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn note_string_defined(&self) {
        self.strings_defined.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_stack_defined(&self) {
        self.stacks_defined.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_frame_sealed(&self) {
        self.frames_sealed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_frames_dropped(&self, n: u64) {
        if n > 0 {
            self.frames_dropped.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn note_record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_drained(&self, frames: u64, bytes: u64) {
        self.frames_drained.fetch_add(frames, Ordering::Relaxed);
        self.bytes_drained.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_live_eviction(&self) {
        self.live_evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_double_alloc(&self) {
        self.double_allocs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_stack_mismatch(&self) {
        self.stack_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn note_untracked_free(&self) {
        self.untracked_frees.fetch_add(1, Ordering::Relaxed);
    }

    /// Latches the string-table-full condition; true on the first call
    /// only, so the wire marker is emitted exactly once.
    #[inline]
    pub fn latch_string_table_full(&self) -> bool {
        !self.string_table_full.swap(true, Ordering::Relaxed)
    }

    /// Latches the stack-table-full condition; true on the first call only.
    #[inline]
    pub fn latch_stack_table_full(&self) -> bool {
        !self.stack_table_full.swap(true, Ordering::Relaxed)
    }

    pub fn untracked_frees(&self) -> u64 {
        self.untracked_frees.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            strings_defined: self.strings_defined.load(Ordering::Relaxed),
            stacks_defined: self.stacks_defined.load(Ordering::Relaxed),
            frames_sealed: self.frames_sealed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            frames_drained: self.frames_drained.load(Ordering::Relaxed),
            bytes_drained: self.bytes_drained.load(Ordering::Relaxed),
            live_evictions: self.live_evictions.load(Ordering::Relaxed),
            double_allocs: self.double_allocs.load(Ordering::Relaxed),
            stack_mismatches: self.stack_mismatches.load(Ordering::Relaxed),
            untracked_frees: self.untracked_frees.load(Ordering::Relaxed),
            string_table_full: self.string_table_full.load(Ordering::Relaxed),
            stack_table_full: self.stack_table_full.load(Ordering::Relaxed),
        }
    }
}

impl Default for RuntimeStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = RuntimeStats::new();
        for _ in 0..100 {
            stats.note_string_defined();
            stats.note_untracked_free();
        }
        stats.note_frames_dropped(3);
        let snap = stats.snapshot();
        assert_eq!(snap.strings_defined, 100);
        assert_eq!(snap.untracked_frees, 100);
        assert_eq!(snap.frames_dropped, 3);
        assert_eq!(snap.double_allocs, 0);
    }

    #[test]
    fn table_full_latches_once() {
        let stats = RuntimeStats::new();
        assert!(stats.latch_string_table_full());
        assert!(!stats.latch_string_table_full());
        assert!(stats.latch_stack_table_full());
        assert!(!stats.latch_stack_table_full());
        assert!(stats.snapshot().string_table_full);
    }
}
