//! # Emtag
//!
//! Buffer-management and interrupt-dispatch core for a USB/RFID reader
//! firmware on a single-core bare-metal MCU. The crate mediates data flow
//! between interrupt producers (USB endpoint completion, RFID-chip events,
//! pin-change signals, periodic timer ticks) and one cooperative
//! main-processing loop, over a small fixed pool of buffers whose ownership
//! is tracked through an explicit state tag. It uses caller-provided
//! buffers, requiring no dynamic memory allocation.
//!
//! ## Architecture
//!
//! ```text
//!  USB / RFID / pin-change IRQs        main loop
//!        │                                │
//!        ▼                                ▼
//!  ┌───────────┐  claim/set_state  ┌────────────┐
//!  │   Demux   │──────────┐        │  Pipeline  │
//!  └─────┬─────┘          ▼        └──────┬─────┘
//!        │          ┌───────────┐         │ claim/release
//!  ┌─────┴─────┐    │  Context  │◄────────┘
//!  │ IrqControl│    │   Pool    │
//!  └───────────┘    └───────────┘
//! ```
//!
//! Components:
//! * _Context Pool_ holds the fixed set of state-tagged buffer slots. A
//!   claim atomically finds a slot in one state and hands it to the caller
//!   under another; ownership is the tag, nothing else.
//! * _Demux_ fans one shared hardware interrupt line out to independently
//!   registered per-source handlers; two instances cover the pin-change and
//!   peripheral groups.
//! * _Pipeline_ is the main-loop body draining completed receives into the
//!   protocol dispatcher and queued replies into the USB transfer layer.
//! * The hardware itself sits behind the `emtag-driver` traits; MCU backends
//!   implement them.
//!
//! ## Concurrency model
//!
//! There is no OS, no scheduler and no heap. Two execution contexts exist:
//! interrupt handlers, which preempt the main loop at any instruction
//! boundary outside a critical section, and the main loop itself. The sole
//! mutual-exclusion primitive is the raw mutex of the pool and demux tables
//! (`CriticalSectionRawMutex` masks and restores interrupts on target).
//! Every lock scope is one tag or table-slot check-and-set; no lock is ever
//! held across a call into driver code, so the worst-case interrupt latency
//! contributed by this crate is one pool scan. Nothing here blocks: `claim`
//! returns a definite outcome immediately and exhaustion is handled as
//! backpressure by the producers.
//!
//! ## Limitations
//!
//! * Context reuse is lowest-index-first, not FIFO; see
//!   [`pool::ContextPool::claim`].
//! * A context whose owner stalls stays unavailable until device reset; the
//!   system watchdog is the recovery mechanism, not this crate.
#![no_std]

pub use emtag_core as core;
pub use emtag_driver::{chip, header, irq};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod demux;
pub mod pipeline;
pub mod pool;
