//! Frame transceiver: the repeat loop as an explicit state machine.
//!
//! One [`Transceiver`] performs `repeats` full-duplex exchanges of a single
//! [`Frame`]. Each call to [`step()`](Transceiver::step) carries out one bounded
//! action (find a start bit, drive one bit, sample one bit, ...) and returns
//! `nb::Error::WouldBlock` until the exchange is finished. Tests drive it one
//! step at a time against a simulated clock; [`lanc_transmit_receive`] simply
//! blocks on it.
//!
//! ```text
//! Idle -> AwaitStart -> StartConfirmed -> TransmitByte <-> ReceiveByte (8 bits)
//!              ^               ^                                |
//!              |               +------ AwaitByteStart <---------+ byte 0..6
//!              +------------------- next repeat <---------------+ byte 7
//!                                      Success | DesyncFailure
//! ```
//!
//! Every bit slot is full-duplex. The outbound bit is driven at the start of the
//! slot and the line is sampled in its middle, so where the controller releases
//! the line the camera's bits are read, and on a loopback the frame comes back
//! unchanged. The line is released after bit 7 of each byte and on any failure.

use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

use crate::clock::Clock;
use crate::consts::{
    BIT_DURATION_US, BITS_PER_BYTE, BYTE_START_TIMEOUT_US, FRAME_LEN, MAX_REPEATS, MAX_REPEATS_U8,
    MAX_SLOT_OVERRUN_US, SAMPLE_OFFSET_US,
};
use crate::error::{LancError, LinkError};
use crate::frame::Frame;
use crate::link::LancLink;

/// Last byte index of a frame.
const LAST_BYTE: u8 = (FRAME_LEN - 1) as u8;

/// Where the exchange currently is.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TransceiverState {
    /// Nothing done yet.
    #[default]
    Idle,
    /// Looking for the first start bit of a frame.
    AwaitStart,
    /// A start bit was seen at `edge`; its window is elapsing.
    StartConfirmed {
        /// Byte the start bit belongs to.
        index: u8,
        /// Time of the assert edge.
        edge: u32,
    },
    /// About to drive `bit` of byte `index`.
    TransmitByte {
        /// Byte within the frame.
        index: u8,
        /// Bit within the byte.
        bit: u8,
        /// Start of the byte's first data slot.
        origin: u32,
    },
    /// About to sample `bit` of byte `index`.
    ReceiveByte {
        /// Byte within the frame.
        index: u8,
        /// Bit within the byte.
        bit: u8,
        /// Start of the byte's first data slot.
        origin: u32,
    },
    /// Waiting for the start bit of byte `index`; the previous byte ended at `after`.
    AwaitByteStart {
        /// Byte within the frame.
        index: u8,
        /// End of the previous byte's last slot.
        after: u32,
    },
    /// All repeats exchanged.
    Success,
    /// Synchronization was lost. The exchange is over.
    DesyncFailure,
}

impl TransceiverState {
    /// Whether the state lies inside a byte, where every microsecond counts.
    pub fn in_byte(&self) -> bool {
        matches!(
            self,
            TransceiverState::StartConfirmed { .. }
                | TransceiverState::TransmitByte { .. }
                | TransceiverState::ReceiveByte { .. }
        )
    }

    /// Whether the exchange has ended, successfully or not.
    pub fn is_done(&self) -> bool {
        matches!(self, TransceiverState::Success | TransceiverState::DesyncFailure)
    }
}

/// One multi-repeat exchange of a frame.
#[derive(Debug)]
pub struct Transceiver {
    state: TransceiverState,
    outbound: Frame,
    inbound: Frame,
    repeats: u8,
    repeat: u8,
    last_frame_end: Option<u32>,
    responses: Vec<Frame, MAX_REPEATS>,
    error: Option<LancError>,
}

impl Transceiver {
    /// Prepares an exchange of `frame`, `repeats` times.
    ///
    /// # Errors
    /// [`LancError::InvalidRepeats`] unless `1 <= repeats <= MAX_REPEATS`.
    pub fn new(frame: Frame, repeats: u8) -> Result<Self, LancError> {
        if repeats == 0 || repeats > MAX_REPEATS_U8 {
            return Err(LancError::InvalidRepeats(repeats));
        }
        Ok(Self {
            state: TransceiverState::Idle,
            outbound: frame,
            inbound: Frame::IDLE,
            repeats,
            repeat: 0,
            last_frame_end: None,
            responses: Vec::new(),
            error: None,
        })
    }

    /// Continues from a frame that ended at `frame_end`, so the first repeat
    /// waits for the next start bit instead of a full frame gap.
    pub fn resume_after(mut self, frame_end: u32) -> Self {
        self.last_frame_end = Some(frame_end);
        self
    }

    /// Current state.
    pub fn state(&self) -> TransceiverState {
        self.state
    }

    /// Zero-based repeat in progress, or the number of repeats once finished.
    pub fn repeat(&self) -> u8 {
        self.repeat
    }

    /// Frames received so far, one per completed repeat.
    pub fn responses(&self) -> &[Frame] {
        &self.responses
    }

    /// End of the last completed frame, usable to resume a later exchange.
    pub fn last_frame_end(&self) -> Option<u32> {
        self.last_frame_end
    }

    /// Advances the exchange by one action.
    ///
    /// # Returns
    /// - `Ok(frame)`: every repeat completed; `frame` is the last one received.
    /// - `Err(nb::Error::WouldBlock)`: call again.
    /// - `Err(nb::Error::Other(LancError::Desync { .. }))`: synchronization was lost
    ///   and the line has been released. Further calls return the same error
    ///   without touching the pins.
    pub fn step<IN, OUT, CLK>(&mut self, link: &mut LancLink<IN, OUT, CLK>) -> nb::Result<Frame, LancError>
    where
        IN: InputPin,
        OUT: OutputPin,
        CLK: Clock,
    {
        match self.state {
            TransceiverState::Success => return Ok(self.inbound),
            TransceiverState::DesyncFailure => {
                return Err(nb::Error::Other(self.error.unwrap_or(LancError::NotStarted)));
            }
            _ => {}
        }
        match self.advance(link) {
            Ok(TransceiverState::Success) => {
                self.state = TransceiverState::Success;
                Ok(self.inbound)
            }
            Ok(next) => {
                self.state = next;
                Err(nb::Error::WouldBlock)
            }
            Err(cause) => {
                link.release();
                let error = LancError::Desync {
                    repeat: self.repeat,
                    cause,
                };
                lanc_warn!("desync in repeat {}: {}", self.repeat, cause);
                self.state = TransceiverState::DesyncFailure;
                self.error = Some(error);
                Err(nb::Error::Other(error))
            }
        }
    }

    /// Like [`step()`](Transceiver::step), but once a start bit is confirmed the
    /// whole byte runs inside a single critical section, so interrupts cannot
    /// stretch a bit slot.
    #[cfg(feature = "interrupt-free")]
    pub fn step_byte<IN, OUT, CLK>(&mut self, link: &mut LancLink<IN, OUT, CLK>) -> nb::Result<Frame, LancError>
    where
        IN: InputPin,
        OUT: OutputPin,
        CLK: Clock,
    {
        if !self.state.in_byte() {
            return self.step(link);
        }
        critical_section::with(|_| loop {
            match self.step(link) {
                Err(nb::Error::WouldBlock) if self.state.in_byte() => continue,
                other => return other,
            }
        })
    }

    /// Without the `interrupt-free` feature this is [`step()`](Transceiver::step).
    #[cfg(not(feature = "interrupt-free"))]
    pub fn step_byte<IN, OUT, CLK>(&mut self, link: &mut LancLink<IN, OUT, CLK>) -> nb::Result<Frame, LancError>
    where
        IN: InputPin,
        OUT: OutputPin,
        CLK: Clock,
    {
        self.step(link)
    }

    fn advance<IN, OUT, CLK>(&mut self, link: &mut LancLink<IN, OUT, CLK>) -> Result<TransceiverState, LinkError>
    where
        IN: InputPin,
        OUT: OutputPin,
        CLK: Clock,
    {
        let next = match self.state {
            TransceiverState::Idle => TransceiverState::AwaitStart,
            TransceiverState::AwaitStart => {
                let edge = match self.last_frame_end {
                    Some(end) => link.wait_next_start(end)?,
                    None => link.find_frame_start()?,
                };
                lanc_trace!("repeat {} synced at {} us", self.repeat, edge);
                TransceiverState::StartConfirmed { index: 0, edge }
            }
            TransceiverState::StartConfirmed { index, edge } => {
                link.wait_start_bit_complete(edge);
                TransceiverState::TransmitByte {
                    index,
                    bit: 0,
                    origin: edge.wrapping_add(BIT_DURATION_US),
                }
            }
            TransceiverState::TransmitByte { index, bit, origin } => {
                let slot_start = BIT_DURATION_US * u32::from(bit);
                let overrun_us = link.delay_us_with_start_time(origin, slot_start);
                check_slot(index, bit, overrun_us)?;
                link.drive(self.outbound.bit(usize::from(index), bit));
                TransceiverState::ReceiveByte { index, bit, origin }
            }
            TransceiverState::ReceiveByte { index, bit, origin } => {
                let sample_at = BIT_DURATION_US * u32::from(bit) + SAMPLE_OFFSET_US;
                let overrun_us = link.delay_us_with_start_time(origin, sample_at);
                check_slot(index, bit, overrun_us)?;
                let asserted = link.line_asserted();
                self.inbound.set_bit(usize::from(index), bit, asserted);
                if bit + 1 < BITS_PER_BYTE {
                    TransceiverState::TransmitByte {
                        index,
                        bit: bit + 1,
                        origin,
                    }
                } else {
                    self.finish_byte(link, index, origin)
                }
            }
            TransceiverState::AwaitByteStart { index, after } => {
                let edge = link.wait_for_start_bit_within(after, BYTE_START_TIMEOUT_US)?;
                TransceiverState::StartConfirmed { index, edge }
            }
            TransceiverState::Success | TransceiverState::DesyncFailure => self.state,
        };
        Ok(next)
    }

    fn finish_byte<IN, OUT, CLK>(&mut self, link: &mut LancLink<IN, OUT, CLK>, index: u8, origin: u32) -> TransceiverState
    where
        IN: InputPin,
        OUT: OutputPin,
        CLK: Clock,
    {
        let end = origin.wrapping_add(BIT_DURATION_US * u32::from(BITS_PER_BYTE));
        let _ = link.delay_us_with_start_time(origin, BIT_DURATION_US * u32::from(BITS_PER_BYTE));
        link.release();
        if index < LAST_BYTE {
            return TransceiverState::AwaitByteStart {
                index: index + 1,
                after: end,
            };
        }

        let _ = self.responses.push(self.inbound);
        self.last_frame_end = Some(end);
        self.repeat += 1;
        lanc_debug!("repeat {} of {} complete", self.repeat, self.repeats);
        if self.repeat >= self.repeats {
            TransceiverState::Success
        } else {
            self.inbound = Frame::IDLE;
            TransceiverState::AwaitStart
        }
    }
}

fn check_slot(byte: u8, bit: u8, overrun_us: u32) -> Result<(), LinkError> {
    if overrun_us > MAX_SLOT_OVERRUN_US {
        return Err(LinkError::TimingViolation { byte, bit, overrun_us });
    }
    Ok(())
}

/// Exchanges `frame` with the camera `repeats` times, blocking until done.
///
/// # Returns
/// The frame received during the last repeat.
///
/// # Errors
/// - [`LancError::InvalidRepeats`] for a repeat count out of range.
/// - [`LancError::Desync`] if any repeat lost synchronization. Nothing is retried.
pub fn lanc_transmit_receive<IN, OUT, CLK>(
    link: &mut LancLink<IN, OUT, CLK>,
    frame: Frame,
    repeats: u8,
) -> Result<Frame, LancError>
where
    IN: InputPin,
    OUT: OutputPin,
    CLK: Clock,
{
    let mut transceiver = Transceiver::new(frame, repeats)?;
    nb::block!(transceiver.step_byte(link))
}
