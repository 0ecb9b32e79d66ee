//! Camera command vocabulary.
//!
//! Each [`Command`] is a fixed `(mode, code)` pair written into bytes 0 and 1 of
//! an otherwise idle [`Frame`]. There is no timing here: commands are staged on
//! the driver and sent by the next [`cycle()`](crate::driver::LancDriver::cycle).
//!
//! The iris commands are the documented codes but have not been confirmed on a
//! camera that supports them.

use crate::consts::{
    CMD_AUTO_FOCUS, CMD_AUTO_IRIS, CMD_FOCUS_FAR, CMD_FOCUS_NEAR, CMD_IRIS_CLOSE, CMD_IRIS_OPEN,
    CMD_POWER_DOWN, CMD_RECORD_TOGGLE, CMD_ZOOM_TELE_BASE, CMD_ZOOM_WIDE_BASE, ZOOM_MAX_SPEED,
};
use crate::error::LancError;
use crate::frame::{CommandMode, Frame};

/// A command the controller can stage for transmission.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Command {
    /// Zoom at a speed in `-8..=8` excluding 0. Negative zooms out (wide),
    /// positive zooms in (tele). Build with [`Command::zoom`].
    Zoom(i8),
    /// Manual focus, farther (`true`) or nearer (`false`).
    Focus(bool),
    /// Start or stop recording.
    RecordToggle,
    /// Toggle autofocus.
    AutoFocus,
    /// Automatic iris.
    AutoIris,
    /// Open (`true`) or close (`false`) the iris one step.
    Iris(bool),
    /// Power the camera off. The camera usually stops driving the link afterwards.
    PowerDown,
    /// Raw normal command code.
    Normal(u8),
    /// Raw special command code.
    Special(u8),
    /// Raw recorder command code.
    Ops(u8),
}

impl Command {
    /// Checked zoom constructor.
    ///
    /// # Errors
    /// [`LancError::ZoomOutOfRange`] for 0 (no zoom, nothing to send) and for any
    /// speed beyond ±8.
    pub fn zoom(step: i8) -> Result<Self, LancError> {
        if step == 0 || !(-ZOOM_MAX_SPEED..=ZOOM_MAX_SPEED).contains(&step) {
            return Err(LancError::ZoomOutOfRange(step));
        }
        Ok(Command::Zoom(step))
    }

    /// The `(mode, code)` pair for this command.
    ///
    /// Zoom speeds map onto every other code: tele 1..8 is `0x00..=0x0e`, wide
    /// 1..8 is `0x10..=0x1e`. A `Zoom` built without [`Command::zoom`] is clamped
    /// into range.
    pub fn encode(self) -> (CommandMode, u8) {
        match self {
            Command::Zoom(step) => {
                let speed = step.unsigned_abs().clamp(1, ZOOM_MAX_SPEED.unsigned_abs()) - 1;
                let base = if step > 0 {
                    CMD_ZOOM_TELE_BASE
                } else {
                    CMD_ZOOM_WIDE_BASE
                };
                (CommandMode::Special, base + speed * 2)
            }
            Command::Focus(true) => (CommandMode::Special, CMD_FOCUS_FAR),
            Command::Focus(false) => (CommandMode::Special, CMD_FOCUS_NEAR),
            Command::RecordToggle => (CommandMode::Normal, CMD_RECORD_TOGGLE),
            Command::AutoFocus => (CommandMode::Special, CMD_AUTO_FOCUS),
            Command::AutoIris => (CommandMode::Special, CMD_AUTO_IRIS),
            Command::Iris(true) => (CommandMode::Special, CMD_IRIS_OPEN),
            Command::Iris(false) => (CommandMode::Special, CMD_IRIS_CLOSE),
            Command::PowerDown => (CommandMode::Normal, CMD_POWER_DOWN),
            Command::Normal(code) => (CommandMode::Normal, code),
            Command::Special(code) => (CommandMode::Special, code),
            Command::Ops(code) => (CommandMode::Ops, code),
        }
    }

    /// The frame that carries this command.
    pub fn frame(self) -> Frame {
        let (mode, code) = self.encode();
        Frame::command(mode, code)
    }
}

impl From<Command> for Frame {
    fn from(command: Command) -> Self {
        command.frame()
    }
}
