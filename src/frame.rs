//! The 8-byte LANC frame.
//!
//! A [`Frame`] is both what the controller drives onto the line and what it reads
//! back. Bytes the controller does not need are left at `0x00`, which keeps the
//! line released for that byte so the camera can answer in it.
//!
//! ## Layout
//!
//! | Byte | Direction         | Content |
//! |------|-------------------|---------|
//! | 0    | controller → cam  | command mode ([`CommandMode`]) |
//! | 1    | controller → cam  | command code |
//! | 2-3  | controller → cam  | unused, idle |
//! | 4-7  | cam → controller  | camera status |
//!
//! Frames are plain `Copy` values: an exchange takes one by value and returns a
//! fresh one, so a failed exchange can never leave half-received bytes behind.

use core::ops::{Index, IndexMut};

use crate::consts::{BITS_PER_BYTE, COMMAND_SLOT, FRAME_LEN, MODE_NORMAL, MODE_OPS, MODE_SLOT, MODE_SPECIAL};

/// Selects how the camera interprets the command byte.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum CommandMode {
    /// Normal command to a VTR or video camera (`0x18`).
    Normal,
    /// Special command to a video camera (`0x28`).
    Special,
    /// Special command to the recorder section (`0x38`).
    Ops,
}

impl CommandMode {
    /// The mode byte placed in [`MODE_SLOT`](crate::consts::MODE_SLOT).
    pub const fn byte(self) -> u8 {
        match self {
            CommandMode::Normal => MODE_NORMAL,
            CommandMode::Special => MODE_SPECIAL,
            CommandMode::Ops => MODE_OPS,
        }
    }

    /// Recognizes a mode byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            MODE_NORMAL => Some(CommandMode::Normal),
            MODE_SPECIAL => Some(CommandMode::Special),
            MODE_OPS => Some(CommandMode::Ops),
            _ => None,
        }
    }
}

/// One LANC frame.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Frame(pub [u8; FRAME_LEN]);

impl Frame {
    /// The all-idle frame. Transmitting it leaves the line released for all 8 bytes.
    pub const IDLE: Frame = Frame([0; FRAME_LEN]);

    /// A frame carrying a single command.
    pub const fn command(mode: CommandMode, code: u8) -> Self {
        let mut bytes = [0; FRAME_LEN];
        bytes[MODE_SLOT] = mode.byte();
        bytes[COMMAND_SLOT] = code;
        Frame(bytes)
    }

    /// Whether no byte of the frame drives the line.
    pub fn is_idle(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The command mode in byte 0, if it is a known one.
    pub fn mode(&self) -> Option<CommandMode> {
        CommandMode::from_byte(self.0[MODE_SLOT])
    }

    /// The command code in byte 1.
    pub fn code(&self) -> u8 {
        self.0[COMMAND_SLOT]
    }

    /// Bit `bit` (0 = first on the wire) of byte `index`.
    pub fn bit(&self, index: usize, bit: u8) -> bool {
        self.0[index] & (1 << bit) != 0
    }

    /// Sets or clears bit `bit` of byte `index`.
    pub fn set_bit(&mut self, index: usize, bit: u8, value: bool) {
        debug_assert!(bit < BITS_PER_BYTE);
        if value {
            self.0[index] |= 1 << bit;
        } else {
            self.0[index] &= !(1 << bit);
        }
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl From<[u8; FRAME_LEN]> for Frame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Frame(bytes)
    }
}

impl Index<usize> for Frame {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Frame {
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.0[index]
    }
}
