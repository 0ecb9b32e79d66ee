//! Constants used across the LANC protocol implementation.
//!
//! This module defines the fixed timing of the link, the frame layout and the
//! command bytes understood by video cameras.
//!
//! ## Key Concepts
//!
//! - **Bit slot**: every bit, including the start bit, occupies [`BIT_DURATION_US`]
//!   (9600 baud).
//! - **Byte**: one start bit driven by the camera, then 8 data bits LSB first,
//!   then a stop period of released line whose length depends on the camera.
//! - **Frame**: 8 bytes, followed by a long idle gap. A frame is sent every
//!   20 ms (PAL) or 16.6 ms (NTSC).
//! - **Polarity**: the line idles high. A low line is *asserted* and an asserted
//!   data bit reads as a logical `1`.
//!
//! None of the timing values are configurable: a camera will not follow a
//! controller that deviates from them.

/// Duration of a single bit slot, in microseconds (9600 baud).
pub const BIT_DURATION_US: u32 = 104;

/// Offset within a bit slot at which the input line is sampled.
pub const SAMPLE_OFFSET_US: u32 = BIT_DURATION_US / 2;

/// Number of data bits carried by each byte.
pub const BITS_PER_BYTE: u8 = 8;

/// Number of bytes in a frame.
pub const FRAME_LEN: usize = 8;

/// Minimum idle time between the last byte of a frame and the next start bit.
///
/// Stop periods between bytes last a few hundred microseconds, so continuous
/// idle of this length marks the gap between two frames.
pub const FRAME_GAP_MIN_US: u32 = 5_000;

/// Upper bound for a cold synchronization (frame gap followed by start bit).
///
/// Two PAL frame periods plus margin.
pub const SYNC_TIMEOUT_US: u32 = 45_000;

/// Upper bound for finding the next frame's start bit after a completed frame.
pub const NEXT_START_TIMEOUT_US: u32 = 25_000;

/// Upper bound, after the last bit of a byte, for the start bit of the next byte
/// in the same frame.
pub const BYTE_START_TIMEOUT_US: u32 = 1_000;

/// How late a bit slot may be serviced before it counts as a timing violation.
pub const MAX_SLOT_OVERRUN_US: u32 = BIT_DURATION_US / 4;

/// Number of repeats the protocol needs for a command to be accepted.
pub const DEFAULT_REPEATS: u8 = 4;

/// Maximum number of repeats per exchange.
pub const MAX_REPEATS: usize = 8;

/// See [`MAX_REPEATS`](crate::consts::MAX_REPEATS)
pub const MAX_REPEATS_U8: u8 = MAX_REPEATS as u8;

/// Frame byte selecting the kind of command carried in the command byte.
pub const MODE_SLOT: usize = 0;

/// Frame byte carrying the command itself.
pub const COMMAND_SLOT: usize = 1;

/// Mode byte: normal command to a VTR or video camera.
pub const MODE_NORMAL: u8 = 0x18;

/// Mode byte: special command to a video camera.
pub const MODE_SPECIAL: u8 = 0x28;

/// Mode byte: special command to the recorder (VTR) section.
pub const MODE_OPS: u8 = 0x38;

/// Normal command: toggle recording.
pub const CMD_RECORD_TOGGLE: u8 = 0x33;

/// Normal command: power off.
pub const CMD_POWER_DOWN: u8 = 0x5e;

/// Special command: zoom towards telephoto, slowest speed.
///
/// Faster speeds follow in steps of two up to `0x0e`.
pub const CMD_ZOOM_TELE_BASE: u8 = 0x00;

/// Special command: zoom towards wide angle, slowest speed.
///
/// Faster speeds follow in steps of two up to `0x1e`.
pub const CMD_ZOOM_WIDE_BASE: u8 = 0x10;

/// Largest zoom speed accepted in either direction.
pub const ZOOM_MAX_SPEED: i8 = 8;

/// Special command: toggle autofocus.
pub const CMD_AUTO_FOCUS: u8 = 0x41;

/// Special command: manual focus farther.
pub const CMD_FOCUS_FAR: u8 = 0x45;

/// Special command: manual focus nearer.
pub const CMD_FOCUS_NEAR: u8 = 0x47;

/// Special command: close the iris. Not verified against a camera.
pub const CMD_IRIS_CLOSE: u8 = 0x53;

/// Special command: open the iris. Not verified against a camera.
pub const CMD_IRIS_OPEN: u8 = 0x55;

/// Special command: automatic iris. Not verified against a camera.
pub const CMD_AUTO_IRIS: u8 = 0xaf;
