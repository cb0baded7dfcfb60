use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use emtag::core::{PeriphId, PinId};
use emtag::demux::{
    Bank, Demux, IrqHandler, PeriphDemux, PinChange, PinDemux, RegistrationError,
};
use emtag::irq::IrqControl;
use emtag::pipeline::Throttle;

/// Register-level model of one shared interrupt line
#[derive(Default)]
struct MockCtrl {
    pending: AtomicU32,
    enabled: AtomicU32,
    configured: AtomicU32,
    acked: AtomicU32,
}

impl MockCtrl {
    fn raise(&self, mask: u32) {
        self.pending.fetch_or(mask, Ordering::SeqCst);
    }
}

impl IrqControl for MockCtrl {
    fn pending(&self) -> u32 {
        self.pending.load(Ordering::SeqCst)
    }

    fn ack(&self, bit: u8) {
        self.pending.fetch_and(!(1 << bit), Ordering::SeqCst);
        self.acked.fetch_or(1 << bit, Ordering::SeqCst);
    }

    fn configure(&self, bit: u8) {
        self.configured.fetch_or(1 << bit, Ordering::SeqCst);
    }

    fn set_enabled(&self, bit: u8, enabled: bool) {
        if enabled {
            self.enabled.fetch_or(1 << bit, Ordering::SeqCst);
        } else {
            self.enabled.fetch_and(!(1 << bit), Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct CountingHandler {
    hits: AtomicU32,
    last: AtomicU32,
}

impl<B: Bank> IrqHandler<B> for CountingHandler {
    fn on_irq(&self, source: B::Source) {
        let bit: u8 = source.into();
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.last.store(bit.into(), Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingHandler {
    order: Mutex<Vec<u8>>,
}

impl IrqHandler<PinChange> for RecordingHandler {
    fn on_irq(&self, source: PinId) {
        self.order.lock().unwrap().push(source.into());
    }
}

fn periph_demux() -> (
    &'static PeriphDemux<CriticalSectionRawMutex, &'static MockCtrl>,
    &'static MockCtrl,
) {
    let ctrl: &'static MockCtrl = Box::leak(Box::new(MockCtrl::default()));
    let demux = Box::leak(Box::new(Demux::new(ctrl)));
    (demux, ctrl)
}

fn pin_demux() -> (
    &'static PinDemux<CriticalSectionRawMutex, &'static MockCtrl>,
    &'static MockCtrl,
) {
    let ctrl: &'static MockCtrl = Box::leak(Box::new(MockCtrl::default()));
    let demux = Box::leak(Box::new(Demux::new(ctrl)));
    (demux, ctrl)
}

#[test]
fn test_register_configures_but_leaves_disabled() {
    let (demux, ctrl) = periph_demux();
    let handler = Box::leak(Box::new(CountingHandler::default()));

    demux.register(PeriphId::new(3).unwrap(), handler).unwrap();
    assert_eq!(ctrl.configured.load(Ordering::SeqCst), 1 << 3);
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 0);

    demux.enable(PeriphId::new(3).unwrap());
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 1 << 3);

    demux.disable(PeriphId::new(3).unwrap());
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 0);
}

#[test]
fn test_second_registration_fails() {
    let (demux, ctrl) = periph_demux();
    let handler = Box::leak(Box::new(CountingHandler::default()));

    let source = PeriphId::new(1).unwrap();
    demux.register(source, handler).unwrap();
    assert_eq!(
        demux.register(source, handler),
        Err(RegistrationError::SourceOccupied)
    );
    // The failed registration must not touch the hardware again
    assert_eq!(ctrl.configured.load(Ordering::SeqCst), 1 << 1);

    demux.unregister(source);
    demux.register(source, handler).unwrap();
}

#[test]
fn test_demux_serves_registered_bit_only() {
    let (demux, ctrl) = periph_demux();
    let handler = Box::leak(Box::new(CountingHandler::default()));

    demux.register(PeriphId::new(5).unwrap(), handler).unwrap();

    // Bits 2 and 5 pending, only bit 5 has a handler
    ctrl.raise((1 << 2) | (1 << 5));
    demux.demux();

    assert_eq!(handler.hits.load(Ordering::SeqCst), 1);
    assert_eq!(handler.last.load(Ordering::SeqCst), 5);
    assert_eq!(demux.spurious(), 1);
    // Both bits acknowledged, nothing left to storm the vector
    assert_eq!(ctrl.acked.load(Ordering::SeqCst), (1 << 2) | (1 << 5));
    assert_eq!(ctrl.pending.load(Ordering::SeqCst), 0);
}

#[test]
fn test_demux_ascending_bit_order() {
    let (demux, ctrl) = pin_demux();
    let handler = Box::leak(Box::new(RecordingHandler::default()));

    for bit in [9, 1, 4, 31] {
        demux.register(PinId::new(bit).unwrap(), handler).unwrap();
    }

    ctrl.raise((1 << 31) | (1 << 9) | (1 << 4) | (1 << 1));
    demux.demux();

    assert_eq!(*handler.order.lock().unwrap(), vec![1, 4, 9, 31]);
}

#[test]
fn test_demux_ignores_bits_beyond_width() {
    let (demux, ctrl) = periph_demux();

    // The status register is 7 sources wide; upper bits are reserved
    ctrl.raise(0xffff_ff80);
    demux.demux();

    assert_eq!(demux.spurious(), 0);
    assert_eq!(ctrl.acked.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unregistered_source_is_spurious() {
    let (demux, ctrl) = periph_demux();
    let handler = Box::leak(Box::new(CountingHandler::default()));

    let source = PeriphId::new(2).unwrap();
    demux.register(source, handler).unwrap();
    demux.unregister(source);
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 0);

    ctrl.raise(1 << 2);
    demux.demux();
    assert_eq!(handler.hits.load(Ordering::SeqCst), 0);
    assert_eq!(demux.spurious(), 1);
}

#[test]
fn test_throttle_and_resume() {
    let (demux, ctrl) = periph_demux();
    let handler = Box::leak(Box::new(CountingHandler::default()));

    let source = PeriphId::new(4).unwrap();
    demux.register(source, handler).unwrap();
    demux.enable(source);
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 1 << 4);

    demux.throttle(source);
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 0);

    demux.resume();
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 1 << 4);

    // A resume with nothing throttled leaves the masks alone
    demux.disable(source);
    demux.resume();
    assert_eq!(ctrl.enabled.load(Ordering::SeqCst), 0);
}
