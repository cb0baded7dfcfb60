//! Hardware boundary of the Emtag core
//!
//! This crate defines the contract between the buffer-management core and the
//! MCU-specific backend: the inbound command wire format, access to one shared
//! interrupt line, and the synchronous RFID protocol-chip bus. Backends
//! implement the traits; the core and the protocol layer consume them.
#![no_std]

pub mod chip;
pub mod header;
pub mod irq;
