//! ## minnessyn-core::intern
//! **Deduplicating string and stack tables with stable 64-bit ids**
//!
//! Both tables are fixed-capacity open-addressed indexes over blake3
//! content fingerprints, sharded so concurrent host threads interning
//! unrelated content never serialize on one lock. Slots are carved out of
//! the resource buffer; a full shard degrades to dropping new definitions
//! instead of growing.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::arena::SHARDS;

/// splitmix64 finalizer, used to spread addresses and caller-chosen ids
/// over the shard/probe space.
#[inline]
pub(crate) fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// First 16 digest bytes as the stored fingerprint, first 8 as the probe
/// hash. Full bytes are never kept; 128 fingerprint bits make accidental
/// collisions negligible for any session-sized corpus.
fn fingerprint(bytes: &[u8]) -> ([u8; 16], u64) {
    let digest = *blake3::hash(bytes).as_bytes();
    let mut fp = [0u8; 16];
    fp.copy_from_slice(&digest[..16]);
    let mut h = [0u8; 8];
    h.copy_from_slice(&digest[..8]);
    (fp, u64::from_le_bytes(h))
}

/// Content-keyed slot. `id == 0` means empty; assigned ids start at 1.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StringSlot {
    fingerprint: [u8; 16],
    id: u64,
}

/// Caller-id-keyed slot. `stack_id == 0` means empty; id 0 is reserved
/// for "no stack context" and never stored.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StackSlot {
    stack_id: u64,
    fingerprint: [u8; 16],
}

/// Result of observing string content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interned {
    /// First sighting; the definition must go on the wire once.
    Defined(u64),
    /// Already known under this id.
    Existing(u64),
    /// Shard exhausted; the content was not stored.
    TableFull,
}

/// Result of observing a caller-asserted stack id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackObserved {
    Defined,
    Repeat,
    /// Same id reasserted with different content.
    Mismatch,
    TableFull,
    /// Id 0 is the reserved "no stack" sentinel.
    Reserved,
}

/// Interns byte strings into dense monotonically assigned ids.
pub struct StringTable {
    slots: *mut StringSlot,
    shard_len: usize,
    locks: [Mutex<()>; SHARDS],
    next_id: AtomicU64,
}

// SAFETY: slot ranges are disjoint per shard and only touched while the
// owning shard lock is held.
unsafe impl Send for StringTable {}
unsafe impl Sync for StringTable {}

impl StringTable {
    /// # Safety
    ///
    /// `slots` must point to `shard_len * SHARDS` zeroed slots that stay
    /// valid and exclusively owned by this table for its whole lifetime.
    pub(crate) unsafe fn from_raw(slots: *mut StringSlot, shard_len: usize) -> Self {
        Self {
            slots,
            shard_len,
            locks: [(); SHARDS].map(|_| Mutex::new(())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shard_len * SHARDS
    }

    /// Looks the content up, assigning the next id on first sight.
    /// Identical bytes always map to the same id for the whole session.
    pub fn intern(&self, bytes: &[u8]) -> Interned {
        let (fp, hash) = fingerprint(bytes);
        let shard = (hash as usize) & (SHARDS - 1);
        let base = shard * self.shard_len;
        let start = ((hash >> 32) as usize) % self.shard_len;

        let _guard = self.locks[shard].lock();
        for i in 0..self.shard_len {
            let idx = base + (start + i) % self.shard_len;
            // SAFETY: idx stays inside this shard's slot range and the
            // shard lock is held.
            let slot = unsafe { &mut *self.slots.add(idx) };
            if slot.id == 0 {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.fingerprint = fp;
                slot.id = id;
                return Interned::Defined(id);
            }
            if slot.fingerprint == fp {
                return Interned::Existing(slot.id);
            }
        }
        Interned::TableFull
    }
}

/// Tracks first-use versus repeat-use of caller-asserted stack ids and
/// detects id reuse with different content.
pub struct StackTable {
    slots: *mut StackSlot,
    shard_len: usize,
    locks: [Mutex<()>; SHARDS],
}

// SAFETY: same sharded-lock discipline as `StringTable`.
unsafe impl Send for StackTable {}
unsafe impl Sync for StackTable {}

impl StackTable {
    /// # Safety
    ///
    /// Same contract as [`StringTable::from_raw`].
    pub(crate) unsafe fn from_raw(slots: *mut StackSlot, shard_len: usize) -> Self {
        Self {
            slots,
            shard_len,
            locks: [(); SHARDS].map(|_| Mutex::new(())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shard_len * SHARDS
    }

    pub fn observe(&self, stack_id: u64, bytes: &[u8]) -> StackObserved {
        if stack_id == 0 {
            return StackObserved::Reserved;
        }
        let (fp, _) = fingerprint(bytes);
        let hash = mix64(stack_id);
        let shard = (hash as usize) & (SHARDS - 1);
        let base = shard * self.shard_len;
        let start = ((hash >> 32) as usize) % self.shard_len;

        let _guard = self.locks[shard].lock();
        for i in 0..self.shard_len {
            let idx = base + (start + i) % self.shard_len;
            // SAFETY: idx stays inside this shard's slot range and the
            // shard lock is held.
            let slot = unsafe { &mut *self.slots.add(idx) };
            if slot.stack_id == 0 {
                slot.stack_id = stack_id;
                slot.fingerprint = fp;
                return StackObserved::Defined;
            }
            if slot.stack_id == stack_id {
                return if slot.fingerprint == fp {
                    StackObserved::Repeat
                } else {
                    StackObserved::Mismatch
                };
            }
        }
        StackObserved::TableFull
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn string_table(slots: Vec<StringSlot>) -> (StringTable, Vec<StringSlot>) {
        let mut slots = slots;
        // SAFETY: test-local backing storage outlives the table.
        let table = unsafe { StringTable::from_raw(slots.as_mut_ptr(), slots.len() / SHARDS) };
        (table, slots)
    }

    fn zeroed_string_slots(n: usize) -> Vec<StringSlot> {
        vec![
            StringSlot {
                fingerprint: [0; 16],
                id: 0,
            };
            n
        ]
    }

    #[test]
    fn same_content_same_id() {
        let (table, _keep) = string_table(zeroed_string_slots(SHARDS * 8));
        assert_eq!(table.intern(b"foo"), Interned::Defined(1));
        assert_eq!(table.intern(b"foo"), Interned::Existing(1));
        assert_eq!(table.intern(b"bar"), Interned::Defined(2));
        assert_eq!(table.intern(b"foo"), Interned::Existing(1));
    }

    #[test]
    fn ids_are_dense_and_monotonic() {
        let (table, _keep) = string_table(zeroed_string_slots(SHARDS * 8));
        for (i, content) in [&b"a"[..], b"b", b"c", b"d"].iter().enumerate() {
            assert_eq!(table.intern(content), Interned::Defined(i as u64 + 1));
        }
    }

    #[test]
    fn full_shard_reports_table_full() {
        let (table, _keep) = string_table(zeroed_string_slots(SHARDS * 4));
        let mut full_seen = false;
        for i in 0..SHARDS as u64 * 4 * 8 {
            if table.intern(&i.to_le_bytes()) == Interned::TableFull {
                full_seen = true;
                break;
            }
        }
        assert!(full_seen, "table never reported exhaustion");
    }

    #[test]
    fn stack_first_use_then_repeat_then_mismatch() {
        let mut slots = vec![
            StackSlot {
                stack_id: 0,
                fingerprint: [0; 16],
            };
            SHARDS * 8
        ];
        // SAFETY: test-local backing storage outlives the table.
        let table = unsafe { StackTable::from_raw(slots.as_mut_ptr(), slots.len() / SHARDS) };

        assert_eq!(table.observe(7, b"frame-a;frame-b"), StackObserved::Defined);
        assert_eq!(table.observe(7, b"frame-a;frame-b"), StackObserved::Repeat);
        assert_eq!(table.observe(7, b"frame-c"), StackObserved::Mismatch);
        assert_eq!(table.observe(0, b"whatever"), StackObserved::Reserved);
    }

    proptest! {
        #[test]
        fn interning_is_stable_under_arbitrary_content(contents in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..64), 1..32,
        )) {
            let (table, _keep) = string_table(zeroed_string_slots(SHARDS * 16));
            let mut first_ids = Vec::new();
            for content in &contents {
                match table.intern(content) {
                    Interned::Defined(id) | Interned::Existing(id) => first_ids.push(id),
                    Interned::TableFull => first_ids.push(0),
                }
            }
            for (content, expected) in contents.iter().zip(&first_ids) {
                if *expected == 0 {
                    continue;
                }
                prop_assert_eq!(table.intern(content), Interned::Existing(*expected));
            }
        }
    }
}
