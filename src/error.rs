//! Error types for the LANC link and driver.
//!
//! Errors are split in two layers:
//!
//! - [`LinkError`]: what went wrong on the wire while servicing one start bit or bit slot.
//! - [`LancError`]: what the transceiver and driver report. Every wire failure during an
//!   exchange is reported as [`LancError::Desync`], since a missed edge invalidates the
//!   timing of the rest of the frame and only a full resynchronization recovers from it.

/// A failure while servicing the wire.
#[derive(thiserror::Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum LinkError {
    /// No start bit was seen within the bounded wait. The camera is absent or the
    /// line is disconnected.
    #[error("no start bit within {waited_us} us")]
    LinkTimeout {
        /// How long the link was polled before giving up.
        waited_us: u32,
    },
    /// A bit slot, or the start of the next frame, fell outside its window.
    ///
    /// A next frame that starts too early is reported against byte 0, bit 0,
    /// its own start bit, with `overrun_us` the missing part of the frame gap.
    #[error("slot {bit} of byte {byte} serviced {overrun_us} us late")]
    TimingViolation {
        /// Index of the byte within the frame.
        byte: u8,
        /// Index of the bit within the byte.
        bit: u8,
        /// How far past the allowed window the slot was serviced.
        overrun_us: u32,
    },
}

/// Errors reported by the transceiver and the driver.
#[derive(thiserror::Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum LancError {
    /// Synchronization was lost during one of the repeats of an exchange.
    #[error("lost synchronization during repeat {repeat}")]
    Desync {
        /// Zero-based repeat in which the failure happened.
        repeat: u8,
        /// The wire failure that caused it.
        #[source]
        cause: LinkError,
    },
    /// The driver is not armed: `begin()` was never called, or a previous cycle
    /// lost synchronization.
    #[error("link not started, call begin()")]
    NotStarted,
    /// A zoom speed of 0 or outside `-8..=8` was requested.
    #[error("zoom speed {0} out of range")]
    ZoomOutOfRange(i8),
    /// A repeat count of 0 or above the supported maximum was requested.
    #[error("repeat count {0} out of range")]
    InvalidRepeats(u8),
}

impl LancError {
    /// The wire failure behind a [`LancError::Desync`], if any.
    pub fn cause(&self) -> Option<LinkError> {
        match self {
            LancError::Desync { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}
