//! ## minnessyn-core::spool
//! **Frame staging buffer and outbound frame ring**
//!
//! Encoded records for the open frame accumulate in a staging region under
//! a short-lived lock; sealing a frame moves the whole batch into a ring
//! of frame descriptors over a byte ring, from which the pump drains to
//! the transport. When the producer outruns the transport, whole
//! undrained frames are discarded oldest-first; a frame the pump has
//! started writing is never discarded, so the byte stream stays
//! parseable.
//!
//! Ring discipline follows the cache-line-aware SPSC layout used for
//! event buses: monotonic logical counters, physical position by mask or
//! modulo, producer and consumer both driven by the host's single control
//! thread.

use parking_lot::Mutex;
use thiserror::Error;

/// Staging buffer exhausted; the record was not appended.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("frame staging buffer full")]
pub struct SpoolFull;

/// Tail bytes of the staging buffer that only frame-trailer records
/// (drop marker, frame end) may use. Event appends stop short of this,
/// so a full frame can always still be terminated on the wire.
pub const TRAILER_RESERVE: usize = 64;

/// One sealed frame inside the ring: logical byte range plus sequence.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDesc {
    pub seq: u64,
    pub start: u64,
    pub len: u64,
}

/// Outcome of sealing the staged records into the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sealed {
    /// Whether the staged frame made it into the ring.
    pub queued: bool,
    /// Queued-but-undrained frames discarded to make room (plus the new
    /// frame itself when `queued` is false).
    pub dropped_frames: u64,
    /// Bytes of the sealed frame.
    pub frame_bytes: u64,
}

struct Staging {
    buf: *mut u8,
    cap: usize,
    len: usize,
}

struct Ring {
    descs: *mut FrameDesc,
    desc_cap: usize,
    /// Logical descriptor counters; `head - tail` frames are queued.
    head: u64,
    tail: u64,
    bytes: *mut u8,
    byte_cap: usize,
    /// Logical byte offsets; `write_pos - read_pos` bytes are queued.
    write_pos: u64,
    read_pos: u64,
    /// Bytes of the tail frame already handed to the transport.
    drain_off: u64,
}

impl Ring {
    fn free_bytes(&self) -> usize {
        self.byte_cap - (self.write_pos - self.read_pos) as usize
    }

    /// # Safety
    ///
    /// `index` must be a live slot in `[tail, head]`, with
    /// `head - tail < desc_cap` when writing the slot at `head`.
    unsafe fn desc(&self, index: u64) -> &mut FrameDesc {
        &mut *self.descs.add(index as usize % self.desc_cap)
    }
}

/// Bounded buffer of encoded frames between the event encoder and the
/// transport pump.
pub struct FrameSpool {
    staging: Mutex<Staging>,
    ring: Mutex<Ring>,
}

// SAFETY: the staging and ring regions are exclusively owned and every
// access happens under the respective mutex.
unsafe impl Send for FrameSpool {}
unsafe impl Sync for FrameSpool {}

impl FrameSpool {
    /// # Safety
    ///
    /// The three regions must be disjoint, sized as given and stay valid
    /// and exclusively owned by this spool for its whole lifetime.
    pub(crate) unsafe fn from_raw(
        staging: *mut u8,
        staging_cap: usize,
        descs: *mut FrameDesc,
        desc_cap: usize,
        bytes: *mut u8,
        byte_cap: usize,
    ) -> Self {
        Self {
            staging: Mutex::new(Staging {
                buf: staging,
                cap: staging_cap,
                len: 0,
            }),
            ring: Mutex::new(Ring {
                descs,
                desc_cap,
                head: 0,
                tail: 0,
                bytes,
                byte_cap,
                write_pos: 0,
                read_pos: 0,
                drain_off: 0,
            }),
        }
    }

    /// Reserves `len` bytes in the open frame and lets `fill` encode the
    /// record in place. Ordering within the frame is append order.
    pub fn append(&self, len: usize, fill: impl FnOnce(&mut [u8])) -> Result<(), SpoolFull> {
        self.append_with_limit(len, fill, TRAILER_RESERVE)
    }

    /// Like [`append`](Self::append), but allowed into the trailer
    /// reserve. Only for the records that close a frame.
    pub fn append_trailer(&self, len: usize, fill: impl FnOnce(&mut [u8])) -> Result<(), SpoolFull> {
        self.append_with_limit(len, fill, 0)
    }

    fn append_with_limit(
        &self,
        len: usize,
        fill: impl FnOnce(&mut [u8]),
        reserve: usize,
    ) -> Result<(), SpoolFull> {
        let mut staging = self.staging.lock();
        if staging.len + len + reserve > staging.cap {
            return Err(SpoolFull);
        }
        // SAFETY: the range is inside the staging region and the staging
        // lock is held.
        let out = unsafe { std::slice::from_raw_parts_mut(staging.buf.add(staging.len), len) };
        fill(out);
        staging.len += len;
        Ok(())
    }

    /// Bytes currently staged for the open frame.
    pub fn staged_bytes(&self) -> usize {
        self.staging.lock().len
    }

    /// Queued frames not yet fully drained.
    pub fn queued_frames(&self) -> u64 {
        let ring = self.ring.lock();
        ring.head - ring.tail
    }

    /// Queued bytes not yet handed to the transport.
    pub fn queued_bytes(&self) -> u64 {
        let ring = self.ring.lock();
        ring.write_pos - ring.read_pos - ring.drain_off
    }

    /// Closes the open frame and moves it into the ring as one unit.
    ///
    /// Makes room by discarding whole undrained frames oldest-first; the
    /// frame currently being drained is protected, and if the staged
    /// frame still does not fit it is itself discarded (`queued: false`).
    pub fn seal(&self, seq: u64) -> Sealed {
        let mut staging = self.staging.lock();
        let frame_len = staging.len;
        staging.len = 0;
        if frame_len == 0 {
            return Sealed {
                queued: false,
                dropped_frames: 0,
                frame_bytes: 0,
            };
        }

        let mut ring = self.ring.lock();
        let mut dropped = 0u64;

        // Byte-ring space and a descriptor slot, reclaimed oldest-first.
        // Space only frees from the front, so once the pump is mid-frame
        // nothing more can be reclaimed.
        while (ring.free_bytes() < frame_len || ring.head - ring.tail == ring.desc_cap as u64)
            && ring.head > ring.tail
            && ring.drain_off == 0
        {
            // SAFETY: tail < head, so the descriptor is live.
            let oldest = unsafe { *ring.desc(ring.tail) };
            ring.tail += 1;
            ring.read_pos = oldest.start + oldest.len;
            dropped += 1;
        }

        if ring.free_bytes() < frame_len || ring.head - ring.tail == ring.desc_cap as u64 {
            return Sealed {
                queued: false,
                dropped_frames: dropped + 1,
                frame_bytes: frame_len as u64,
            };
        }

        let start = ring.write_pos;
        let phys = (start % ring.byte_cap as u64) as usize;
        let first = frame_len.min(ring.byte_cap - phys);
        // SAFETY: both segments lie inside the byte ring, the source is
        // the locked staging region, and free_bytes confirmed capacity.
        unsafe {
            std::ptr::copy_nonoverlapping(staging.buf, ring.bytes.add(phys), first);
            if first < frame_len {
                std::ptr::copy_nonoverlapping(
                    staging.buf.add(first),
                    ring.bytes,
                    frame_len - first,
                );
            }
            *ring.desc(ring.head) = FrameDesc {
                seq,
                start,
                len: frame_len as u64,
            };
        }
        ring.head += 1;
        ring.write_pos += frame_len as u64;

        Sealed {
            queued: true,
            dropped_frames: dropped,
            frame_bytes: frame_len as u64,
        }
    }

    /// Hands queued bytes to `write` until it reports zero acceptance,
    /// fails, or the ring is empty. Partial progress is remembered, so a
    /// frame interrupted mid-write resumes at the same position.
    pub fn drain<E>(&self, mut write: impl FnMut(&[u8]) -> Result<usize, E>) -> Result<u64, E> {
        let mut ring = self.ring.lock();
        let mut total = 0u64;

        while ring.head > ring.tail {
            // SAFETY: tail < head, so the descriptor is live.
            let desc = unsafe { *ring.desc(ring.tail) };
            let remaining = (desc.len - ring.drain_off) as usize;
            let phys = ((desc.start + ring.drain_off) % ring.byte_cap as u64) as usize;
            let contiguous = remaining.min(ring.byte_cap - phys);

            // SAFETY: the segment is inside the byte ring and belongs to
            // a queued frame; the ring lock is held.
            let chunk = unsafe { std::slice::from_raw_parts(ring.bytes.add(phys), contiguous) };
            let written = write(chunk)?.min(contiguous);
            total += written as u64;
            ring.drain_off += written as u64;

            if ring.drain_off == desc.len {
                ring.tail += 1;
                ring.read_pos = desc.start + desc.len;
                ring.drain_off = 0;
            }
            if written < contiguous {
                break;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Regions {
        staging: Vec<u8>,
        descs: Vec<FrameDesc>,
        bytes: Vec<u8>,
    }

    fn spool(staging_cap: usize, desc_cap: usize, byte_cap: usize) -> (FrameSpool, Regions) {
        let mut regions = Regions {
            staging: vec![0; staging_cap],
            descs: vec![
                FrameDesc {
                    seq: 0,
                    start: 0,
                    len: 0
                };
                desc_cap
            ],
            bytes: vec![0; byte_cap],
        };
        // SAFETY: test-local backing storage outlives the spool.
        let spool = unsafe {
            FrameSpool::from_raw(
                regions.staging.as_mut_ptr(),
                staging_cap,
                regions.descs.as_mut_ptr(),
                desc_cap,
                regions.bytes.as_mut_ptr(),
                byte_cap,
            )
        };
        (spool, regions)
    }

    fn stage(spool: &FrameSpool, payload: &[u8]) {
        spool
            .append(payload.len(), |out| out.copy_from_slice(payload))
            .unwrap();
    }

    #[test]
    fn append_seal_drain_roundtrip() {
        let (spool, _keep) = spool(256, 8, 1024);
        stage(&spool, b"hello ");
        stage(&spool, b"world");
        let sealed = spool.seal(1);
        assert!(sealed.queued);
        assert_eq!(sealed.frame_bytes, 11);
        assert_eq!(spool.queued_frames(), 1);

        let mut sink = Vec::new();
        let drained: Result<u64, ()> = spool.drain(|chunk| {
            sink.extend_from_slice(chunk);
            Ok(chunk.len())
        });
        assert_eq!(drained.unwrap(), 11);
        assert_eq!(sink, b"hello world");
        assert_eq!(spool.queued_frames(), 0);
    }

    #[test]
    fn staging_overflow_is_reported_not_grown() {
        let (spool, _keep) = spool(TRAILER_RESERVE + 16, 8, 1024);
        assert!(spool.append(16, |out| out.fill(0xaa)).is_ok());
        assert_eq!(spool.append(1, |_| {}), Err(SpoolFull));
        // The trailer reserve stays usable so the frame can still close.
        assert!(spool.append_trailer(16, |out| out.fill(0xbb)).is_ok());
    }

    #[test]
    fn zero_acceptance_makes_zero_progress_and_keeps_frames() {
        let (spool, _keep) = spool(128, 8, 1024);
        stage(&spool, b"payload");
        spool.seal(1);

        let drained: Result<u64, ()> = spool.drain(|_| Ok(0));
        assert_eq!(drained.unwrap(), 0);
        assert_eq!(spool.queued_frames(), 1);
        assert_eq!(spool.queued_bytes(), 7);
    }

    #[test]
    fn partial_drain_resumes_mid_frame() {
        let (spool, _keep) = spool(128, 8, 1024);
        stage(&spool, b"abcdefgh");
        spool.seal(1);

        let mut sink = Vec::new();
        let mut quota = 3usize;
        let step: Result<u64, ()> = spool.drain(|chunk| {
            let n = chunk.len().min(quota);
            sink.extend_from_slice(&chunk[..n]);
            quota -= n;
            Ok(n)
        });
        assert_eq!(step.unwrap(), 3);
        assert_eq!(spool.queued_frames(), 1);

        let rest: Result<u64, ()> = spool.drain(|chunk| {
            sink.extend_from_slice(chunk);
            Ok(chunk.len())
        });
        assert_eq!(rest.unwrap(), 5);
        assert_eq!(sink, b"abcdefgh");
        assert_eq!(spool.queued_frames(), 0);
    }

    #[test]
    fn overflow_discards_oldest_frames_first() {
        let (spool, _keep) = spool(128, 8, 64);
        for seq in 1..=3u64 {
            stage(&spool, &[seq as u8; 24]);
            let sealed = spool.seal(seq);
            if seq <= 2 {
                assert!(sealed.queued);
                assert_eq!(sealed.dropped_frames, 0);
            } else {
                // 3 * 24 > 64: the oldest frame goes, the new one fits.
                assert!(sealed.queued);
                assert_eq!(sealed.dropped_frames, 1);
            }
        }
        let mut sink = Vec::new();
        let _: Result<u64, ()> = spool.drain(|chunk| {
            sink.extend_from_slice(chunk);
            Ok(chunk.len())
        });
        assert_eq!(sink.len(), 48);
        assert_eq!(sink[0], 2, "frame 1 should have been discarded");
        assert_eq!(sink[24], 3);
    }

    #[test]
    fn mid_drain_frame_is_protected_from_discard() {
        let (spool, _keep) = spool(128, 8, 64);
        stage(&spool, &[1u8; 40]);
        spool.seal(1);

        // Start draining frame 1 but stop after a few bytes.
        let mut quota = 8usize;
        let _: Result<u64, ()> = spool.drain(|chunk| {
            let n = chunk.len().min(quota);
            quota -= n;
            Ok(n)
        });

        // Frame 2 cannot fit and frame 1 is mid-drain: frame 2 is dropped.
        stage(&spool, &[2u8; 40]);
        let sealed = spool.seal(2);
        assert!(!sealed.queued);
        assert_eq!(sealed.dropped_frames, 1);

        // Frame 1 still completes byte-exact.
        let mut sink = Vec::new();
        let _: Result<u64, ()> = spool.drain(|chunk| {
            sink.extend_from_slice(chunk);
            Ok(chunk.len())
        });
        assert_eq!(sink, [1u8; 32]);
    }

    #[test]
    fn byte_ring_wraparound_preserves_content() {
        let (spool, _keep) = spool(128, 8, 48);
        let mut sink = Vec::new();
        for round in 0u8..6 {
            stage(&spool, &[round; 20]);
            assert!(spool.seal(round as u64 + 1).queued);
            let _: Result<u64, ()> = spool.drain(|chunk| {
                sink.extend_from_slice(chunk);
                Ok(chunk.len())
            });
        }
        assert_eq!(sink.len(), 120);
        for round in 0u8..6 {
            assert!(sink[round as usize * 20..][..20].iter().all(|&b| b == round));
        }
    }
}
