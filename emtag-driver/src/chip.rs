//! RFID protocol-chip bus
//!
//! The protocol chip is controlled through synchronous register and FIFO
//! accesses during inbound command processing. Failures surface as
//! command-specific status codes read back from chip registers, never as
//! errors of the buffer-management core.

/// Synchronous register and FIFO access to the RFID protocol chip
///
/// Calls run in main-loop context while the caller owns a context in the
/// `MainProcessing` state. Implementations may busy-wait on chip readiness
/// but must not touch the context pool.
pub trait RegisterBus {
    /// Reads one chip register.
    fn read(&mut self, reg: u8) -> u8;

    /// Writes one chip register.
    fn write(&mut self, reg: u8, value: u8);

    /// Drains the chip receive FIFO into `buf`, returning the byte count.
    fn read_fifo(&mut self, buf: &mut [u8]) -> usize;

    /// Feeds the chip transmit FIFO.
    fn write_fifo(&mut self, data: &[u8]);
}
