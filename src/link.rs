//! Link synchronizer and line primitives.
//!
//! [`LancLink`] owns the two GPIO lines and the microsecond clock. It knows how
//! to read and drive the LANC line and how to find the camera's start bits; it
//! knows nothing about repeats or frames. The frame-level state machine lives in
//! [`crate::transceiver`].
//!
//! ## Timing model
//!
//! All waits are measured against an absolute reference time, never re-armed
//! per call: [`delay_us_with_start_time`](LancLink::delay_us_with_start_time)
//! spins until `start + wait`, so time spent driving or sampling inside a slot
//! is absorbed instead of accumulating over 8 bits and several repeats.
//!
//! ```text
//!  line  ‾‾‾‾‾‾|___|‾b0‾|‾b1‾| ... |‾b7‾|‾‾‾‾‾‾‾ stop ‾‾‾‾‾‾|___| ...
//!              ^edge ^origin                                 ^next start bit
//!              |<->| start bit, BIT_DURATION_US
//! ```
//!
//! Each data slot `k` spans `origin + k * BIT_DURATION_US` for one bit duration
//! and is sampled at [`SAMPLE_OFFSET_US`] into the slot.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::clock::Clock;
use crate::consts::{
    BIT_DURATION_US, BITS_PER_BYTE, FRAME_GAP_MIN_US, MAX_SLOT_OVERRUN_US, NEXT_START_TIMEOUT_US,
    SAMPLE_OFFSET_US, SYNC_TIMEOUT_US,
};
use crate::error::LinkError;

/// Differences between two clock readings at or above this are a time before
/// the reference, not after it.
const HALF_CLOCK_RANGE_US: u32 = u32::MAX / 2;

/// Electrical configuration of the two lines.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct LinePolarity {
    /// Whether driving the output pin high asserts (pulls low) the LANC line.
    ///
    /// `true` for the usual NPN transistor stage between the pin and the line.
    pub output_active_high: bool,
    /// Whether the input pin reads the inverse of the LANC line level.
    pub input_inverted: bool,
}

impl Default for LinePolarity {
    fn default() -> Self {
        Self {
            output_active_high: true,
            input_inverted: false,
        }
    }
}

/// The LANC line: input pin, output pin and clock.
///
/// ## Type Parameters
///
/// - `IN`: [`embedded_hal::digital::InputPin`] reading the LANC line
/// - `OUT`: [`embedded_hal::digital::OutputPin`] driving the LANC line
/// - `CLK`: [`Clock`] providing microseconds
#[derive(Debug)]
pub struct LancLink<IN, OUT, CLK>
where
    IN: InputPin,
    OUT: OutputPin,
    CLK: Clock,
{
    /// Input pin
    pub input: IN,
    /// Output pin
    pub output: OUT,
    /// Time source
    pub clock: CLK,
    polarity: LinePolarity,
}

impl<IN, OUT, CLK> LancLink<IN, OUT, CLK>
where
    IN: InputPin,
    OUT: OutputPin,
    CLK: Clock,
{
    /// Binds the two lines and the clock. Does not touch the pins.
    pub fn new(input: IN, output: OUT, clock: CLK, polarity: LinePolarity) -> Self {
        Self {
            input,
            output,
            clock,
            polarity,
        }
    }

    /// Current time in microseconds.
    pub fn now(&mut self) -> u32 {
        self.clock.now_us()
    }

    /// Electrical configuration in use.
    pub fn polarity(&self) -> LinePolarity {
        self.polarity
    }

    fn read_raw(&mut self) -> bool {
        // A failed read counts as the idle (high) line.
        let level = self.input.is_high().unwrap_or(!self.polarity.input_inverted);
        level != self.polarity.input_inverted
    }

    /// Debounced read of the LANC line level, `true` for high (released).
    ///
    /// Takes three reads and returns the majority.
    pub fn input_state(&mut self) -> bool {
        let votes = self.read_raw() as u8 + self.read_raw() as u8 + self.read_raw() as u8;
        votes >= 2
    }

    /// Whether the line is currently pulled low by anyone.
    pub fn line_asserted(&mut self) -> bool {
        !self.input_state()
    }

    /// Drives the output so that the line is asserted (`true`) or released (`false`).
    pub fn drive(&mut self, assert: bool) {
        if assert == self.polarity.output_active_high {
            let _ = self.output.set_high();
        } else {
            let _ = self.output.set_low();
        }
    }

    /// Releases the line.
    pub fn release(&mut self) {
        self.drive(false);
    }

    /// Spins until `start_time + wait_time`.
    ///
    /// The wait is relative to `start_time`, not to the moment of the call, so
    /// work already done since `start_time` shortens it.
    ///
    /// A `start_time` up to half the clock range ahead of now is in the future
    /// and is waited for in full.
    ///
    /// # Returns
    /// How many microseconds past the deadline the wait returned. A call made
    /// after the deadline returns immediately with the full lateness.
    pub fn delay_us_with_start_time(&mut self, start_time: u32, wait_time: u32) -> u32 {
        loop {
            let elapsed = self.clock.now_us().wrapping_sub(start_time);
            if elapsed < HALF_CLOCK_RANGE_US && elapsed >= wait_time {
                return elapsed - wait_time;
            }
        }
    }

    /// Asserts the line for the bit slot starting at `slot_start`.
    ///
    /// Returns the overrun at the end of the slot.
    pub fn transmit_one(&mut self, slot_start: u32) -> u32 {
        self.drive(true);
        self.delay_us_with_start_time(slot_start, BIT_DURATION_US)
    }

    /// Releases the line for the bit slot starting at `slot_start`.
    ///
    /// Returns the overrun at the end of the slot.
    pub fn transmit_zero(&mut self, slot_start: u32) -> u32 {
        self.drive(false);
        self.delay_us_with_start_time(slot_start, BIT_DURATION_US)
    }

    /// Waits for a start bit: the line must be seen released, then asserted.
    ///
    /// Polling is bounded by `timeout_us` measured from `since`, which lets a
    /// caller bound the wait relative to an earlier event.
    ///
    /// # Returns
    /// The time at which the assert edge was observed.
    pub fn wait_for_start_bit_within(&mut self, since: u32, timeout_us: u32) -> Result<u32, LinkError> {
        let mut seen_idle = false;
        loop {
            let now = self.clock.now_us();
            let waited_us = now.wrapping_sub(since);
            if waited_us > timeout_us {
                return Err(LinkError::LinkTimeout { waited_us });
            }
            if self.line_asserted() {
                if seen_idle {
                    return Ok(now);
                }
            } else {
                seen_idle = true;
            }
        }
    }

    /// Waits for the next start bit, bounded by [`SYNC_TIMEOUT_US`].
    ///
    /// # Errors
    /// [`LinkError::LinkTimeout`] if the line shows no start bit in time.
    pub fn wait_for_start_bit(&mut self) -> Result<u32, LinkError> {
        let since = self.clock.now_us();
        self.wait_for_start_bit_within(since, SYNC_TIMEOUT_US)
    }

    /// Spins until the start bit that began at `start_time` is over.
    pub fn wait_start_bit_complete(&mut self, start_time: u32) {
        let _ = self.delay_us_with_start_time(start_time, BIT_DURATION_US);
    }

    /// Waits for [`FRAME_GAP_MIN_US`] of continuous idle line, the gap that
    /// separates two frames.
    ///
    /// # Returns
    /// The time at which the gap was confirmed.
    pub fn wait_frame_gap(&mut self, since: u32, timeout_us: u32) -> Result<u32, LinkError> {
        let mut idle_since = self.clock.now_us();
        loop {
            let now = self.clock.now_us();
            let waited_us = now.wrapping_sub(since);
            if waited_us > timeout_us {
                return Err(LinkError::LinkTimeout { waited_us });
            }
            if self.line_asserted() {
                idle_since = now;
            } else if now.wrapping_sub(idle_since) >= FRAME_GAP_MIN_US {
                return Ok(now);
            }
        }
    }

    /// Cold start: finds a frame gap, then the first start bit after it.
    ///
    /// # Returns
    /// The time of the start bit's assert edge.
    pub fn find_frame_start(&mut self) -> Result<u32, LinkError> {
        let since = self.clock.now_us();
        let _ = self.wait_frame_gap(since, SYNC_TIMEOUT_US)?;
        let edge = self.wait_for_start_bit_within(since, SYNC_TIMEOUT_US)?;
        lanc_trace!("frame start at {} us", edge);
        Ok(edge)
    }

    /// Locates the start of a frame from scratch and waits out its start bit.
    ///
    /// # Returns
    /// The origin of the frame's first data slot.
    pub fn sync_transmission(&mut self) -> Result<u32, LinkError> {
        let edge = self.find_frame_start()?;
        self.wait_start_bit_complete(edge);
        Ok(edge.wrapping_add(BIT_DURATION_US))
    }

    /// Warm start: after a frame that ended at `frame_end`, waits for the first
    /// start bit of the next frame.
    ///
    /// # Errors
    /// - [`LinkError::TimingViolation`] if a start bit arrives before a full frame
    ///   gap has passed, meaning a byte was missed and the frame count is off.
    ///   It is reported against byte 0, bit 0 (the frame's start bit), with
    ///   `overrun_us` the part of the gap that was missing.
    /// - [`LinkError::LinkTimeout`] if no start bit arrives in time.
    pub fn wait_next_start(&mut self, frame_end: u32) -> Result<u32, LinkError> {
        let edge = self.wait_for_start_bit_within(frame_end, NEXT_START_TIMEOUT_US)?;
        let gap = edge.wrapping_sub(frame_end);
        if gap < FRAME_GAP_MIN_US {
            return Err(LinkError::TimingViolation {
                byte: 0,
                bit: 0,
                overrun_us: FRAME_GAP_MIN_US - gap,
            });
        }
        Ok(edge)
    }

    /// Drives a whole byte, LSB first, in the slots following `origin`, then
    /// releases the line. Waits for `origin` if it is still ahead.
    ///
    /// Does not look at the input. See [`crate::transceiver`] for the full-duplex
    /// exchange used by the driver.
    ///
    /// # Errors
    /// [`LinkError::TimingViolation`] if a slot starts too late to be driven.
    pub fn transmit_byte(&mut self, byte: u8, origin: u32) -> Result<(), LinkError> {
        for bit in 0..BITS_PER_BYTE {
            let slot_start = origin.wrapping_add(BIT_DURATION_US * u32::from(bit));
            let late = self.delay_us_with_start_time(slot_start, 0);
            if late > MAX_SLOT_OVERRUN_US {
                self.release();
                return Err(LinkError::TimingViolation {
                    byte: 0,
                    bit,
                    overrun_us: late,
                });
            }
            let _ = if byte & (1 << bit) != 0 {
                self.transmit_one(slot_start)
            } else {
                self.transmit_zero(slot_start)
            };
        }
        self.release();
        Ok(())
    }

    /// Samples a whole byte, LSB first, in the slots following `origin`.
    ///
    /// # Errors
    /// [`LinkError::TimingViolation`] if a sample point is missed.
    pub fn receive_byte(&mut self, origin: u32) -> Result<u8, LinkError> {
        let mut byte = 0u8;
        for bit in 0..BITS_PER_BYTE {
            let sample_at = BIT_DURATION_US * u32::from(bit) + SAMPLE_OFFSET_US;
            let overrun_us = self.delay_us_with_start_time(origin, sample_at);
            if overrun_us > MAX_SLOT_OVERRUN_US {
                return Err(LinkError::TimingViolation {
                    byte: 0,
                    bit,
                    overrun_us,
                });
            }
            if self.line_asserted() {
                byte |= 1 << bit;
            }
        }
        let _ = self.delay_us_with_start_time(origin, BIT_DURATION_US * u32::from(BITS_PER_BYTE));
        Ok(byte)
    }
}
