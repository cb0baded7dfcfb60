//! Fixed context pool and the claim/release allocation protocol
//!
//! The pool is the only memory shared between interrupt handlers and the main
//! loop. Each slot pairs a caller-provided byte buffer with a state tag; the
//! tag alone decides which execution context may touch the buffer. There is
//! no reference counting and no per-slot lock: ownership transfers happen as
//! one tag check-and-set inside the raw-mutex critical section, so the
//! worst-case interrupt latency added by the pool is a single array scan.

use core::cell::{RefCell, UnsafeCell};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::core::ContextState;

/// Number of contexts a reader firmware allocates at boot
pub const DEFAULT_CONTEXT_COUNT: usize = 8;

/// Capacity of a small (command/reply) context buffer
pub const SMALL_BUFFER_SIZE: usize = 64;

/// Capacity of a large (tag data transfer) context buffer
pub const LARGE_BUFFER_SIZE: usize = 256;

struct Slot {
    data: NonNull<u8>,
    capacity: usize,
    len: UnsafeCell<usize>,
}

/// The static set of request contexts
///
/// Built once at boot over caller-provided `'static` storage; slots are never
/// freed or reallocated, only their tags and buffer contents churn. The raw
/// mutex is the firmware's interrupt mask/restore primitive
/// (`CriticalSectionRawMutex` on target, the std critical section in host
/// tests); every lock scope in this module is one tag check-and-set.
pub struct ContextPool<M: RawMutex, const N: usize = DEFAULT_CONTEXT_COUNT> {
    tags: Mutex<M, RefCell<[ContextState; N]>>,
    slots: [Slot; N],
    claim_failures: AtomicU32,
}

// Safety: slot buffers are accessed exclusively through the state-tag
// protocol; the tag table itself is guarded by the blocking mutex.
unsafe impl<M: RawMutex, const N: usize> Sync for ContextPool<M, N> {}

impl<M: RawMutex, const N: usize> ContextPool<M, N> {
    /// Builds the pool over caller-provided buffers.
    ///
    /// Buffer capacities may differ per slot; a typical reader keeps a few
    /// [`LARGE_BUFFER_SIZE`] slots for tag data transfers and fills the rest
    /// with [`SMALL_BUFFER_SIZE`] command buffers. Every context starts
    /// [`Free`](ContextState::Free).
    pub fn new(storage: [&'static mut [u8]; N]) -> Self {
        let slots = storage.map(|buf| Slot {
            data: unwrap!(NonNull::new(buf.as_mut_ptr())),
            capacity: buf.len(),
            len: UnsafeCell::new(0),
        });
        Self {
            tags: Mutex::new(RefCell::new([ContextState::Free; N])),
            slots,
            claim_failures: AtomicU32::new(0),
        }
    }

    /// Finds the first context tagged `old`, retags it `new` and hands out
    /// its ownership token.
    ///
    /// The scan runs lowest index first, so low-index contexts are reused
    /// preferentially; there is no FIFO ordering across contexts. That is
    /// sufficient while context lifetimes stay uniform and is the documented
    /// limitation of this pool.
    ///
    /// Never blocks. `None` means no context carries `old`; the caller
    /// handles exhaustion by throttling its source or dropping the work. A
    /// failed claim increments [`claim_failures`](Self::claim_failures).
    pub fn claim(&self, old: ContextState, new: ContextState) -> Option<Context<'_>> {
        debug_assert_ne!(old, new);
        debug_assert_ne!(new, ContextState::Invalid);

        let claimed = self.tags.lock(|cell| {
            let mut tags = cell.borrow_mut();
            let index = tags.iter().position(|tag| *tag == old)?;
            tags[index] = new;
            Some(index)
        });

        match claimed {
            Some(index) => Some(Context {
                slot: &self.slots[index],
                index,
            }),
            None => {
                self.claim_failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Retags an owned context, consuming its token.
    ///
    /// Runs in the same critical section as [`claim`](Self::claim) scans, so
    /// a concurrent claimant observes either the old or the new tag, never a
    /// half transition. Whoever later claims `state` becomes the next owner.
    pub fn set_state(&self, ctx: Context<'_>, state: ContextState) {
        debug_assert!(core::ptr::eq(ctx.slot, &self.slots[ctx.index]));
        debug_assert_ne!(state, ContextState::Invalid);

        self.tags.lock(|cell| {
            cell.borrow_mut()[ctx.index] = state;
        });
    }

    /// Returns a context to the pool. The single release point of every
    /// pipeline stage.
    pub fn release(&self, ctx: Context<'_>) {
        self.set_state(ctx, ContextState::Free);
    }

    /// Reads one context's current tag.
    ///
    /// Diagnostic access; the tag may change the instant the lock is dropped
    /// unless the caller owns the context.
    pub fn state(&self, index: usize) -> ContextState {
        self.tags.lock(|cell| cell.borrow()[index])
    }

    /// Maps a buffer address back to its pool index.
    ///
    /// Used for sequence numbering and diagnostics by code that only holds a
    /// pointer into a context buffer (e.g. a DMA completion record).
    pub fn index_of(&self, ptr: *const u8) -> Option<usize> {
        let addr = ptr as usize;
        self.slots.iter().position(|slot| {
            let start = slot.data.as_ptr() as usize;
            addr >= start && addr < start + slot.capacity
        })
    }

    /// Number of claims that found no matching context since boot.
    ///
    /// A rising value under sustained load means the pool is the bottleneck:
    /// producers are dropping or throttling work.
    pub fn claim_failures(&self) -> u32 {
        self.claim_failures.load(Ordering::Relaxed)
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

/// Ownership token of one claimed context
///
/// Holding the token is the only way to reach the slot buffer; the pool never
/// exposes raw slot references. The token is not clonable and is consumed by
/// [`ContextPool::set_state`]/[`ContextPool::release`]. Dropping it without a
/// release leaves the context parked in its current state until device reset,
/// which mirrors what a stalled owner does on hardware.
#[must_use]
pub struct Context<'a> {
    slot: &'a Slot,
    index: usize,
}

// Safety: the state-tag protocol guarantees a single owner per context; the
// token may move into interrupt context together with that ownership.
unsafe impl Send for Context<'_> {}

impl<'a> Context<'a> {
    /// Pool index of this context, also used as its sequence number.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Capacity of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.slot.capacity
    }

    /// Number of valid bytes in the buffer.
    pub fn len(&self) -> usize {
        // Safety: the token grants exclusive slot access
        unsafe { *self.slot.len.get() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records how many buffer bytes are valid. Clamped to the capacity.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.slot.capacity);
        // Safety: the token grants exclusive slot access
        unsafe { *self.slot.len.get() = len.min(self.slot.capacity) }
    }

    /// The valid part of the buffer.
    pub fn data(&self) -> &[u8] {
        // Safety: the token grants exclusive slot access
        unsafe { core::slice::from_raw_parts(self.slot.data.as_ptr(), self.len()) }
    }

    /// The whole buffer, for producers filling it.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        // Safety: the token grants exclusive slot access
        unsafe { core::slice::from_raw_parts_mut(self.slot.data.as_ptr(), self.slot.capacity) }
    }

    /// Copies `src` into the buffer and sets the valid length.
    ///
    /// Returns the copied byte count, truncated to the capacity.
    pub fn fill_from(&mut self, src: &[u8]) -> usize {
        let len = src.len().min(self.capacity());
        self.buffer_mut()[..len].copy_from_slice(&src[..len]);
        self.set_len(len);
        len
    }
}
