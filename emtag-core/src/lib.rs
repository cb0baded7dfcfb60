//! Reader firmware core data types
//!
//! This crate provides basic data type definitions used by other Emtag crates.
//! Emtag users should not depend on this crate directly. Use `emtag::core` reexport instead.
#![no_std]

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// Outbound USB endpoint index
///
/// Identifies one IN endpoint of the device configuration. Endpoint 0 is the
/// default reply endpoint; higher indices are used by bulk/interrupt data
/// paths when the configuration defines them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EpId(u8);

impl EpId {
    const MAX_VALUE: u8 = 0x3;
    pub const MAX: EpId = EpId(Self::MAX_VALUE);

    /// The default reply endpoint
    pub const REPLY: EpId = EpId(0);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl From<EpId> for u8 {
    fn from(value: EpId) -> Self {
        value.into_u8()
    }
}

impl From<EpId> for usize {
    fn from(value: EpId) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for EpId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Pin-change interrupt source, one bit of the shared pin-change status register
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(u8);

impl PinId {
    const MAX_VALUE: u8 = 0x1f;
    pub const MAX: PinId = PinId(Self::MAX_VALUE);

    /// Number of sources sharing the pin-change interrupt line
    pub const COUNT: usize = Self::MAX_VALUE as usize + 1;

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl From<PinId> for u8 {
    fn from(value: PinId) -> Self {
        value.into_u8()
    }
}

impl From<PinId> for usize {
    fn from(value: PinId) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for PinId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Peripheral interrupt source, one bit of the shared system interrupt status register
///
/// The MCU family routes up to seven peripheral request lines (RFID protocol
/// chip, serial receiver, PLL monitor, watchdog, periodic timer, ...) through
/// one vector. The assignment of ids to peripherals belongs to the board
/// support code, not to this crate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeriphId(u8);

impl PeriphId {
    const MAX_VALUE: u8 = 0x6;
    pub const MAX: PeriphId = PeriphId(Self::MAX_VALUE);

    /// Number of sources sharing the peripheral interrupt line
    pub const COUNT: usize = Self::MAX_VALUE as usize + 1;

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl From<PeriphId> for u8 {
    fn from(value: PeriphId) -> Self {
        value.into_u8()
    }
}

impl From<PeriphId> for usize {
    fn from(value: PeriphId) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for PeriphId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Data-producing interrupt source that may hold a context while its handler runs
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqSource {
    /// RFID protocol chip event
    Rfid,
    /// Serial receiver
    Serial,
    /// GPIO pin-change group
    PinChange,
}

/// Ownership tag of one request context
///
/// The tag alone decides which execution context may touch the associated
/// buffer. Transitions happen only through the context pool, inside its
/// critical section, so a tag read and the matching retag are atomic with
/// respect to every other claim.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContextState {
    /// Unowned, available to any claimant
    Free,
    /// A receive path is filling the buffer
    RecvBusy,
    /// Reception complete, queued for the main loop
    RecvDone,
    /// The main loop owns the buffer for protocol processing
    MainProcessing,
    /// Queued for transmission on the given outbound endpoint
    EpPending(EpId),
    /// Handed to the USB transfer layer on the given outbound endpoint
    EpBusy(EpId),
    /// A data-producing interrupt handler owns the buffer
    IrqBusy(IrqSource),
    /// Sentinel, never assigned to a live context
    Invalid,
}
