//! ## minnessyn-runtime::session
//! **The explicit instrumentation context**
//!
//! One `Session` owns the partitioned resource buffer for its whole
//! lifetime: event operations may be called from any host thread, while
//! `finish_frame`, `pump`, `wait_for_viewer` and `detach` belong to the
//! host's single control thread. No operation ever allocates from the
//! host's allocator or blocks, except `wait_for_viewer`, which blocks by
//! design until a viewer attaches.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use minnessyn_config::RuntimeConfig;
use minnessyn_core::arena::{partition, Partitions, RegionLayout};
use minnessyn_core::intern::{Interned, StackObserved};
use minnessyn_core::live::AllocOutcome;
use minnessyn_core::stats::{RuntimeStats, StatsSnapshot};
use minnessyn_wire::{Record, TableKind, ViolationKind, PREAMBLE};

use crate::connection::{Connection, ConnectionState};
use crate::error::RuntimeError;
use crate::transport::{Transport, TransportError};

pub use minnessyn_core::arena::min_required_memory;

/// Returned by [`Session::intern_string`] when the string table is
/// exhausted and the content could not be assigned an id.
pub const UNKNOWN_STRING_ID: u64 = 0;

/// Attempts to push the 6-byte preamble before giving up on a freshly
/// accepted peer.
const PREAMBLE_WRITE_RETRIES: u32 = 1024;

thread_local! {
    /// (frame epoch, stack id) the calling thread last asserted. A stale
    /// epoch means the frame has moved on and the context no longer
    /// applies.
    static STACK_CONTEXT: Cell<(u64, u64)> = const { Cell::new((0, 0)) };
}

/// One active instrumentation session over one caller-supplied buffer.
pub struct Session<'buf> {
    parts: Partitions<'buf>,
    stats: RuntimeStats,
    frame_seq: AtomicU64,
    frame_epoch: AtomicU64,
    connection: Mutex<Connection>,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl<'buf> Session<'buf> {
    /// Claims `buffer` and brings the runtime up. The buffer must hold at
    /// least [`min_required_memory`] bytes for the configured stack-trace
    /// budget and be 64-byte aligned.
    pub fn attach(buffer: &'buf mut [u8], config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let layout = RegionLayout::for_budget(config.bytes_for_stacktrace);
        let parts = partition(buffer, &layout)?;
        info!(
            budget = config.bytes_for_stacktrace,
            reserved = layout.total_bytes,
            string_slots = layout.string_slots,
            stack_slots = layout.stack_slots,
            live_slots = layout.live_slots,
            "instrumentation session attached"
        );
        Ok(Self {
            parts,
            stats: RuntimeStats::new(),
            frame_seq: AtomicU64::new(0),
            frame_epoch: AtomicU64::new(0),
            connection: Mutex::new(Connection::new()),
        })
    }

    fn emit(&self, record: &Record<'_>) {
        let len = record.encoded_len();
        let appended = self.parts.spool.append(len, |out| {
            record.encode_into(out);
        });
        if appended.is_err() {
            self.stats.note_record_dropped();
        }
    }

    /// Frame-closing records go through the staging trailer reserve, so
    /// a frame filled to the brim by event records still terminates.
    fn emit_trailer(&self, record: &Record<'_>) {
        let len = record.encoded_len();
        let appended = self.parts.spool.append_trailer(len, |out| {
            record.encode_into(out);
        });
        if appended.is_err() {
            self.stats.note_record_dropped();
        }
    }

    fn set_stack_context(&self, stack_id: u64) {
        let epoch = self.frame_epoch.load(Ordering::Acquire);
        STACK_CONTEXT.with(|ctx| ctx.set((epoch, stack_id)));
    }

    fn stack_context(&self) -> u64 {
        let epoch = self.frame_epoch.load(Ordering::Acquire);
        STACK_CONTEXT.with(|ctx| {
            let (asserted_epoch, stack_id) = ctx.get();
            if asserted_epoch == epoch {
                stack_id
            } else {
                0
            }
        })
    }

    /// Interns `bytes`, returning its stable id. The defining record goes
    /// on the wire exactly once per distinct content; repeats emit an
    /// 8-byte reference. Returns [`UNKNOWN_STRING_ID`] once the table is
    /// exhausted.
    pub fn intern_string(&self, bytes: &[u8]) -> u64 {
        match self.parts.strings.intern(bytes) {
            Interned::Defined(id) => {
                self.stats.note_string_defined();
                self.emit(&Record::StringDefine { id, bytes });
                id
            }
            Interned::Existing(id) => {
                self.emit(&Record::StringRef { id });
                id
            }
            Interned::TableFull => {
                if self.stats.latch_string_table_full() {
                    self.emit(&Record::TableFull {
                        table: TableKind::Strings,
                    });
                }
                UNKNOWN_STRING_ID
            }
        }
    }

    /// Records a stack trace under the caller-asserted `stack_id` and
    /// makes it the calling thread's context for subsequent allocations.
    /// Reasserting an id with different content is a protocol violation
    /// surfaced to the viewer, not an error. Id 0 is reserved for "no
    /// stack" and ignored.
    pub fn record_stack(&self, stack_id: u64, bytes: &[u8]) {
        match self.parts.stacks.observe(stack_id, bytes) {
            StackObserved::Defined => {
                self.stats.note_stack_defined();
                self.emit(&Record::StackDefine {
                    id: stack_id,
                    bytes,
                });
                self.set_stack_context(stack_id);
            }
            StackObserved::Repeat => {
                self.emit(&Record::StackRef { id: stack_id });
                self.set_stack_context(stack_id);
            }
            StackObserved::Mismatch => {
                self.stats.note_stack_mismatch();
                self.emit(&Record::Violation {
                    kind: ViolationKind::StackReuseMismatch,
                    subject: stack_id,
                    detail: bytes.len() as u64,
                });
                self.set_stack_context(stack_id);
            }
            StackObserved::TableFull => {
                if self.stats.latch_stack_table_full() {
                    self.emit(&Record::TableFull {
                        table: TableKind::Stacks,
                    });
                }
                self.set_stack_context(0);
            }
            StackObserved::Reserved => {}
        }
    }

    /// Records a live allocation at `address`, tagged with the caller's
    /// opaque `region_id` and the thread's current stack context.
    /// Address 0 is never a real allocation and is ignored.
    pub fn record_alloc(&self, address: u64, size: u64, region_id: u64) {
        if address == 0 {
            return;
        }
        let stack = self.stack_context();
        match self.parts.live.insert(address, size, region_id, stack) {
            AllocOutcome::Inserted => {}
            AllocOutcome::Replaced { prev_size, .. } => {
                self.stats.note_double_alloc();
                self.emit(&Record::Violation {
                    kind: ViolationKind::DoubleAlloc,
                    subject: address,
                    detail: prev_size,
                });
            }
            AllocOutcome::Evicted { addr } => {
                self.stats.note_live_eviction();
                self.emit(&Record::Evicted { addr });
            }
        }
        self.emit(&Record::Alloc {
            addr: address,
            size,
            region_id,
            stack,
        });
    }

    /// Drops the live record for `address`. Freeing an address the
    /// runtime never tracked (allocated before `attach`, or already
    /// freed) only ticks a diagnostic counter.
    pub fn record_free(&self, address: u64) {
        if self.parts.live.remove(address).is_some() {
            self.emit(&Record::Free { addr: address });
        } else {
            self.stats.note_untracked_free();
        }
    }

    /// Closes the open frame as one atomic unit tagged with the next
    /// sequence number and starts the next one. Thread stack contexts do
    /// not carry across the boundary.
    pub fn finish_frame(&self) {
        let seq = self.frame_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let dropped_frames = self.stats.frames_dropped();
        let dropped_records = self.stats.records_dropped();
        if dropped_frames > 0 || dropped_records > 0 {
            self.emit_trailer(&Record::DropMark {
                frames: dropped_frames,
                records: dropped_records,
            });
        }
        self.emit_trailer(&Record::FrameEnd { seq });

        let sealed = self.parts.spool.seal(seq);
        if sealed.queued {
            self.stats.note_frame_sealed();
        }
        self.stats.note_frames_dropped(sealed.dropped_frames);
        self.frame_epoch.fetch_add(1, Ordering::Release);
    }

    /// Blocks until a viewer attaches through `transport`, then writes
    /// the stream preamble. On failure the connection returns to
    /// `Disconnected` and the call may simply be retried.
    pub fn wait_for_viewer<T: Transport>(&self, transport: &mut T) -> Result<(), RuntimeError> {
        self.connection.lock().begin_wait()?;
        debug!("waiting for viewer");

        if let Err(e) = transport.wait_for_peer() {
            self.connection.lock().reset();
            warn!(error = %e, "viewer wait failed");
            return Err(e.into());
        }
        if let Err(e) = write_all(transport, &PREAMBLE) {
            self.connection.lock().reset();
            warn!(error = %e, "preamble write failed");
            return Err(e.into());
        }
        self.connection.lock().established();
        info!("viewer connected");
        Ok(())
    }

    /// Hands queued frame bytes to the transport without blocking:
    /// partial progress is kept and the call returns as soon as the
    /// transport stops accepting. Returns the bytes written.
    pub fn pump<T: Transport>(&self, transport: &mut T) -> Result<u64, RuntimeError> {
        if !self.connection.lock().is_writable() {
            return Err(TransportError::Unavailable.into());
        }
        let frames_before = self.parts.spool.queued_frames();
        let mut handed = 0u64;
        let outcome = self.parts.spool.drain(|chunk| {
            let n = transport.try_write(chunk)?;
            handed += n as u64;
            Ok::<usize, TransportError>(n)
        });
        let frames_after = self.parts.spool.queued_frames();
        self.stats.note_drained(frames_before - frames_after, handed);
        trace!(bytes = handed, "pumped message queue");
        match outcome {
            Ok(_) => Ok(handed),
            Err(e) => {
                self.connection.lock().reset();
                warn!(error = %e, "transport failed mid-drain");
                Err(e.into())
            }
        }
    }

    /// Flushes the open frame, attempts one best-effort final drain and
    /// releases the buffer back to the host. Consumes the session, so no
    /// event call can race the teardown through this handle.
    pub fn detach<T: Transport>(self, transport: &mut T) -> Result<StatsSnapshot, RuntimeError> {
        self.finish_frame();
        {
            let mut conn = self.connection.lock();
            conn.begin_drain();
        }
        if self.connection.lock().is_writable() {
            loop {
                match self.pump(transport) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if self.parts.spool.queued_frames() == 0 => break,
                    Ok(_) => {}
                }
            }
        }
        self.connection.lock().close();
        transport.close();

        let snap = self.stats.snapshot();
        info!(
            frames = snap.frames_sealed,
            dropped = snap.frames_dropped,
            drained = snap.frames_drained,
            "session detached"
        );
        Ok(snap)
    }

    /// Current diagnostic counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of allocations currently tracked as live.
    pub fn live_allocations(&self) -> u64 {
        self.parts.live.len()
    }

    /// Sealed frames not yet fully handed to the transport.
    pub fn queued_frames(&self) -> u64 {
        self.parts.spool.queued_frames()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.lock().state()
    }
}

fn write_all<T: Transport>(transport: &mut T, mut buf: &[u8]) -> Result<(), TransportError> {
    let mut stalls = 0;
    while !buf.is_empty() {
        let n = transport.try_write(buf)?;
        if n == 0 {
            stalls += 1;
            if stalls > PREAMBLE_WRITE_RETRIES {
                return Err(TransportError::Unavailable);
            }
            std::thread::yield_now();
            continue;
        }
        stalls = 0;
        buf = &buf[n..];
    }
    Ok(())
}

/// Host-owned storage for the single active session, for embedders that
/// keep the runtime in a static rather than threading the `Session`
/// value through their code.
pub struct SessionSlot<'buf> {
    inner: Option<Session<'buf>>,
}

impl<'buf> SessionSlot<'buf> {
    pub const fn empty() -> Self {
        Self { inner: None }
    }

    /// Brings the runtime up in this slot. Fails with
    /// [`RuntimeError::AlreadyInitialized`] when a session is live.
    pub fn init(
        &mut self,
        buffer: &'buf mut [u8],
        config: &RuntimeConfig,
    ) -> Result<&mut Session<'buf>, RuntimeError> {
        if self.inner.is_some() {
            return Err(RuntimeError::AlreadyInitialized);
        }
        let session = Session::attach(buffer, config)?;
        Ok(self.inner.insert(session))
    }

    /// Tears the held session down. Fails with
    /// [`RuntimeError::NotInitialized`] when no session is live.
    pub fn deinit<T: Transport>(&mut self, transport: &mut T) -> Result<StatsSnapshot, RuntimeError> {
        match self.inner.take() {
            Some(session) => session.detach(transport),
            None => Err(RuntimeError::NotInitialized),
        }
    }

    pub fn session(&self) -> Option<&Session<'buf>> {
        self.inner.as_ref()
    }
}
