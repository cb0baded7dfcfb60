//! Interrupt demultiplexers
//!
//! One physical interrupt line is shared by up to 32 pin-change sources or
//! 7 peripheral sources on this MCU family. The demultiplexer makes each
//! logical source independently registrable: peripheral drivers (PLL-lock
//! monitor, load-modulation control, watchdog logger, periodic timer) attach
//! through [`register`](Demux::register) without the core knowing about them.
//!
//! Handler invocation happens outside the handler-table critical section;
//! the lock only covers the table lookup itself.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::core::{InvalidValue, PeriphId, PinId};
use crate::irq::IrqControl;
use crate::pipeline::Throttle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationError {
    SourceOccupied,
}

/// Binds one shared interrupt line to its source-id type and width
pub trait Bank: 'static {
    /// Number of logical sources sharing the line, at most 32
    const WIDTH: usize;
    type Source: Copy + Into<u8> + TryFrom<u8, Error = InvalidValue>;
}

/// The 32-bit pin-change interrupt group
pub enum PinChange {}

impl Bank for PinChange {
    const WIDTH: usize = PinId::COUNT;
    type Source = PinId;
}

/// The 7-source peripheral ("system") interrupt group
pub enum Periph {}

impl Bank for Periph {
    const WIDTH: usize = PeriphId::COUNT;
    type Source = PeriphId;
}

/// Per-source callback invoked from the shared interrupt entry point
///
/// Runs in interrupt context: claim contexts, move bytes, retag, return.
/// Handlers must clear their own peripheral-level request flag; the demux
/// acknowledges only the shared-line latch.
pub trait IrqHandler<B: Bank>: Sync {
    fn on_irq(&self, source: B::Source);
}

/// Fan-out dispatcher for one shared interrupt line
///
/// `N` must equal `B::WIDTH`; it sizes the handler table. Both demux
/// instances of a reader firmware are this one type:
/// [`PinDemux`] and [`PeriphDemux`].
pub struct Demux<M: RawMutex, B: Bank, C: IrqControl, const N: usize> {
    ctrl: C,
    inner: Mutex<M, RefCell<Inner<B, N>>>,
    spurious: AtomicU32,
}

pub type PinDemux<M, C> = Demux<M, PinChange, C, { PinId::COUNT }>;
pub type PeriphDemux<M, C> = Demux<M, Periph, C, { PeriphId::COUNT }>;

struct Inner<B: Bank, const N: usize> {
    handlers: [Option<&'static dyn IrqHandler<B>>; N],
    throttled: u32,
}

impl<M: RawMutex, B: Bank, C: IrqControl, const N: usize> Demux<M, B, C, N> {
    const WIDTH_OK: () = assert!(N == B::WIDTH && N <= u32::BITS as usize);

    const SOURCE_MASK: u32 = u32::MAX >> (u32::BITS as usize - N);

    pub fn new(ctrl: C) -> Self {
        let () = Self::WIDTH_OK;
        Self {
            ctrl,
            inner: Mutex::new(RefCell::new(Inner {
                handlers: [None; N],
                throttled: 0,
            })),
            spurious: AtomicU32::new(0),
        }
    }

    /// Installs a handler for one source.
    ///
    /// Configures detection for the source but leaves delivery disabled until
    /// [`enable`](Self::enable). At most one handler per source; an occupied
    /// slot fails the registration and the hardware is not touched.
    pub fn register(
        &self,
        source: B::Source,
        handler: &'static dyn IrqHandler<B>,
    ) -> Result<(), RegistrationError> {
        let bit = source.into();
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let slot = &mut inner.handlers[usize::from(bit)];
            if slot.is_some() {
                return Err(RegistrationError::SourceOccupied);
            }
            *slot = Some(handler);
            Ok(())
        })?;

        // Hardware setup runs outside the critical section
        self.ctrl.configure(bit);
        self.ctrl.set_enabled(bit, false);
        Ok(())
    }

    /// Removes the handler and disables the source.
    pub fn unregister(&self, source: B::Source) {
        let bit = source.into();
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.throttled &= !(1 << bit);
            inner.handlers[usize::from(bit)] = None;
        });
        self.ctrl.set_enabled(bit, false);
    }

    /// Lets the source assert the shared line again.
    ///
    /// Also clears any pending throttle mark for the source.
    pub fn enable(&self, source: B::Source) {
        let bit = source.into();
        self.inner.lock(|cell| {
            cell.borrow_mut().throttled &= !(1 << bit);
        });
        self.ctrl.set_enabled(bit, true);
    }

    /// Gates the source off the shared line.
    pub fn disable(&self, source: B::Source) {
        self.ctrl.set_enabled(source.into(), false);
    }

    /// Disables the source and marks it for a later [`Throttle::resume`].
    ///
    /// Producers call this when the context pool is exhausted; the pipeline
    /// re-enables every marked source once contexts may have freed.
    pub fn throttle(&self, source: B::Source) {
        let bit = source.into();
        self.ctrl.set_enabled(bit, false);
        self.inner.lock(|cell| {
            cell.borrow_mut().throttled |= 1 << bit;
        });
    }

    /// Fans the shared interrupt out to the registered handlers.
    ///
    /// Called from the line's single hardware entry point. Reads the pending
    /// mask once, then serves set bits in ascending order. Sources without a
    /// handler are acknowledged and counted so a stuck request line cannot
    /// storm the vector.
    pub fn demux(&self) {
        let mut pending = self.ctrl.pending() & Self::SOURCE_MASK;
        while pending != 0 {
            let bit = pending.trailing_zeros() as u8;
            pending &= pending - 1;

            let handler = self.inner.lock(|cell| cell.borrow().handlers[usize::from(bit)]);

            // Acknowledge first so edges arriving during the handler are
            // latched for the next round
            self.ctrl.ack(bit);
            match handler {
                Some(handler) => handler.on_irq(unwrap!(B::Source::try_from(bit))),
                None => {
                    self.spurious.fetch_add(1, Ordering::Relaxed);
                    warn!("spurious irq source {}", bit);
                }
            }
        }
    }

    /// Number of pending sources observed without a registered handler.
    pub fn spurious(&self) -> u32 {
        self.spurious.load(Ordering::Relaxed)
    }
}

impl<M: RawMutex, B: Bank, C: IrqControl, const N: usize> Throttle for Demux<M, B, C, N> {
    fn resume(&self) {
        let mut throttled = self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            core::mem::take(&mut inner.throttled)
        });
        while throttled != 0 {
            let bit = throttled.trailing_zeros() as u8;
            throttled &= throttled - 1;
            self.ctrl.set_enabled(bit, true);
        }
    }
}
