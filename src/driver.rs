//! LANC camera remote driver.
//!
//! This module provides the [`LancDriver`] struct, which owns the two LANC
//! lines and a microsecond clock, holds the command to send, and runs one
//! multi-repeat exchange per [`cycle()`](LancDriver::cycle).
//!
//! ## Features
//!
//! - Pure software timing: busy-waits against a [`Clock`], no UART or timer interrupt
//! - Full-duplex frames: the command goes out in bytes 0-1 while the camera's
//!   status comes back in bytes 4-7 of the same frame
//! - Each command is repeated ([`DEFAULT_REPEATS`] by default) as the protocol requires
//! - Uses `embedded-hal` for pin abstraction and portability
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! use lanc::driver::{LancConfig, LancDriver};
//!
//! # let input = Pin::new(&[]);
//! # let output = Pin::new(&[PinTransaction::set(PinState::Low)]);
//! # let mut t = 0u32;
//! # let micros = move || { t += 1; t };
//! let mut driver = LancDriver::new(input, output, micros, LancConfig::default());
//! driver.begin();
//! driver.zoom(4).unwrap();
//!
//! loop {
//!     # break; // Mock pins cannot play a camera
//!     if !driver.cycle() {
//!         driver.begin();
//!     }
//! }
//! # let (mut input, mut output, _) = driver.release();
//! # input.done();
//! # output.done();
//! ```
//!
//! ## Scheduling
//!
//! `cycle()` blocks for the whole exchange (about `repeats` frame periods).
//! Calling it again within [`MAX_LOOP_GAP_US`] of its return lets the driver
//! keep the frame timing it already has; otherwise it has to find a frame gap
//! again, which costs an extra frame. See [`crate::timer`] for a ready-made loop.

use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

use crate::clock::Clock;
use crate::command::Command;
use crate::consts::{DEFAULT_REPEATS, MAX_REPEATS};
use crate::error::LancError;
use crate::frame::Frame;
use crate::link::{LancLink, LinePolarity};
use crate::timer::MAX_LOOP_GAP_US;
use crate::transceiver::Transceiver;

/// Operational mode of the [`LancDriver`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum DriverMode {
    /// Constructed, `begin()` not called yet. The pins have not been touched.
    #[default]
    Unconfigured,
    /// Line configured, cycles will run.
    Armed,
    /// The last cycle lost synchronization. Nothing touches the pins until
    /// `begin()` is called again.
    Desynced,
}

/// Runtime configuration.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct LancConfig {
    /// Exchanges per cycle, `1..=MAX_REPEATS`.
    pub repeats: u8,
    /// How the pins are wired to the line.
    pub polarity: LinePolarity,
}

impl Default for LancConfig {
    fn default() -> Self {
        Self {
            repeats: DEFAULT_REPEATS,
            polarity: LinePolarity::default(),
        }
    }
}

/// A bit-banged LANC controller.
///
/// ## Type Parameters
///
/// - `IN`: [`embedded_hal::digital::InputPin`] reading the LANC line
/// - `OUT`: [`embedded_hal::digital::OutputPin`] driving the LANC line
/// - `CLK`: a [`Clock`] with microsecond resolution
///
/// ## Notes
///
/// - One driver per pair of pins. Nothing else may drive the output pin.
/// - The staged command is sent on every cycle until it is replaced or cleared
///   with [`clear_command()`](LancDriver::clear_command); zoom and focus act for
///   as long as they are sent.
#[derive(Debug)]
pub struct LancDriver<IN, OUT, CLK>
where
    IN: InputPin,
    OUT: OutputPin,
    CLK: Clock,
{
    /// The current mode of the driver
    pub mode: DriverMode,
    link: LancLink<IN, OUT, CLK>,
    repeats: u8,
    staged: Frame,
    last_response: Option<Frame>,
    responses: Vec<Frame, MAX_REPEATS>,
    last_frame_end: Option<u32>,

    /// Counter of cycles that completed every repeat.
    pub cycles_good: u16,

    /// Counter of cycles that lost synchronization.
    ///
    /// A count that keeps growing means the camera is absent, off, or not LANC.
    pub desyncs: u16,
}

impl<IN, OUT, CLK> LancDriver<IN, OUT, CLK>
where
    IN: InputPin,
    OUT: OutputPin,
    CLK: Clock,
{
    /// Creates a driver on the given lines. No pin is touched until
    /// [`begin()`](LancDriver::begin).
    ///
    /// # Arguments
    /// - `input`: The pin reading the LANC line.
    /// - `output`: The pin driving the LANC line (usually through a transistor).
    /// - `clock`: A free-running microsecond counter.
    /// - `config`: Repeats per cycle and line polarity.
    pub fn new(input: IN, output: OUT, clock: CLK, config: LancConfig) -> Self {
        Self {
            mode: DriverMode::Unconfigured,
            link: LancLink::new(input, output, clock, config.polarity),
            repeats: config.repeats,
            staged: Frame::IDLE,
            last_response: None,
            responses: Vec::new(),
            last_frame_end: None,
            cycles_good: 0,
            desyncs: 0,
        }
    }

    /// Puts the line in its idle state and arms the driver.
    ///
    /// Must be called before the first cycle and after every failed one. Calling
    /// it again on an armed driver only resets the line and the frame timing.
    pub fn begin(&mut self) {
        self.link.release();
        self.last_frame_end = None;
        self.mode = DriverMode::Armed;
        lanc_debug!("lanc link armed");
    }

    /// Runs one cycle: `repeats` exchanges of the staged command.
    ///
    /// # Returns
    /// - `true`: the link is in sync and the command went out on every repeat.
    /// - `false`: the driver is not armed, or synchronization was lost. Call
    ///   [`begin()`](LancDriver::begin) before the next cycle.
    pub fn cycle(&mut self) -> bool {
        self.exchange().is_ok()
    }

    /// Like [`cycle()`](LancDriver::cycle), returning the received frame or the reason
    /// for the failure.
    ///
    /// # Errors
    /// - [`LancError::NotStarted`]: `begin()` is needed. The pins are not touched.
    /// - [`LancError::InvalidRepeats`]: the configured repeat count is out of range.
    /// - [`LancError::Desync`]: the link lost synchronization; the driver is now
    ///   [`DriverMode::Desynced`].
    pub fn exchange(&mut self) -> Result<Frame, LancError> {
        if self.mode != DriverMode::Armed {
            return Err(LancError::NotStarted);
        }
        let mut transceiver = Transceiver::new(self.staged, self.repeats)?;
        if let Some(end) = self.last_frame_end {
            if self.link.now().wrapping_sub(end) <= MAX_LOOP_GAP_US {
                transceiver = transceiver.resume_after(end);
            }
        }

        let result = nb::block!(transceiver.step_byte(&mut self.link));
        self.responses.clear();
        let _ = self.responses.extend_from_slice(transceiver.responses());

        match result {
            Ok(frame) => {
                self.last_response = Some(frame);
                self.last_frame_end = transceiver.last_frame_end();
                self.cycles_good = self.cycles_good.wrapping_add(1);
                Ok(frame)
            }
            Err(e) => {
                self.last_response = None;
                self.last_frame_end = None;
                self.mode = DriverMode::Desynced;
                self.desyncs = self.desyncs.wrapping_add(1);
                lanc_warn!("lanc cycle failed, resync required: {}", e);
                Err(e)
            }
        }
    }

    /// The frame received during the last repeat of the last successful cycle.
    ///
    /// `None` before the first cycle and after a failed one.
    pub fn last_response(&self) -> Option<Frame> {
        self.last_response
    }

    /// Frames received during each completed repeat of the last cycle.
    pub fn responses(&self) -> &[Frame] {
        &self.responses
    }

    /// The frame the next cycle will send.
    pub fn staged(&self) -> Frame {
        self.staged
    }

    /// Access to the underlying line, e.g. for half-duplex use.
    pub fn link(&mut self) -> &mut LancLink<IN, OUT, CLK> {
        &mut self.link
    }

    /// Gives the pins and clock back.
    pub fn release(self) -> (IN, OUT, CLK) {
        (self.link.input, self.link.output, self.link.clock)
    }

    /// Replaces the staged frame with `command`.
    pub fn stage(&mut self, command: Command) {
        self.staged = command.frame();
    }

    /// Stages a zoom at `step_size` in `-8..=8`. Negative zooms out.
    ///
    /// # Errors
    /// [`LancError::ZoomOutOfRange`] for 0 or anything beyond ±8. The staged
    /// frame is left as it was.
    pub fn zoom(&mut self, step_size: i8) -> Result<(), LancError> {
        let command = Command::zoom(step_size)?;
        self.stage(command);
        Ok(())
    }

    /// Stages a manual focus step, farther (`true`) or nearer (`false`).
    pub fn focus(&mut self, far: bool) {
        self.stage(Command::Focus(far));
    }

    /// Stages a record start/stop toggle.
    pub fn record_toggle(&mut self) {
        self.stage(Command::RecordToggle);
    }

    /// Stages an autofocus toggle.
    pub fn auto_focus(&mut self) {
        self.stage(Command::AutoFocus);
    }

    /// Stages automatic iris.
    ///
    /// # Notes
    /// The code is the documented one but has not been confirmed on a camera.
    pub fn auto_iris(&mut self) {
        self.stage(Command::AutoIris);
    }

    /// Stages an iris step, opening (`true`) or closing (`false`).
    ///
    /// # Notes
    /// The codes are the documented ones but have not been confirmed on a camera.
    pub fn iris(&mut self, more_open: bool) {
        self.stage(Command::Iris(more_open));
    }

    /// Stages a power off. The camera will most likely stop talking afterwards,
    /// and the following cycles will fail.
    pub fn power_down(&mut self) {
        self.stage(Command::PowerDown);
    }

    /// Stages the idle frame: the next cycles send no command.
    pub fn clear_command(&mut self) {
        self.staged = Frame::IDLE;
    }

    /// Stages a raw normal command.
    pub fn video_camera_normal_command(&mut self, data: u8) {
        self.stage(Command::Normal(data));
    }

    /// Stages a raw special command.
    pub fn video_camera_special_command(&mut self, data: u8) {
        self.stage(Command::Special(data));
    }

    /// Stages a raw recorder command.
    pub fn video_camera_ops_command(&mut self, data: u8) {
        self.stage(Command::Ops(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BIT_DURATION_US;
    use crate::sim::{Camera, FRAME_PERIOD_US, SimBus};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    fn counting_clock() -> impl FnMut() -> u32 {
        let mut t = 0u32;
        move || {
            t += 1;
            t
        }
    }

    #[test]
    fn test_driver_initialization() {
        let input = PinMock::new(&[]);
        let output = PinMock::new(&[]);

        let driver = LancDriver::new(input, output, counting_clock(), LancConfig::default());

        assert_eq!(driver.mode, DriverMode::Unconfigured);
        assert_eq!(driver.staged(), Frame::IDLE);
        assert_eq!(driver.last_response(), None);
        let (mut input, mut output, _) = driver.release();
        input.done();
        output.done();
    }

    #[test]
    fn test_cycle_before_begin_touches_nothing() {
        let input = PinMock::new(&[]);
        let output = PinMock::new(&[]);
        let mut driver = LancDriver::new(input, output, counting_clock(), LancConfig::default());

        assert!(!driver.cycle());
        assert_eq!(driver.exchange(), Err(LancError::NotStarted));
        let (mut input, mut output, _) = driver.release();
        input.done();
        output.done();
    }

    #[test]
    fn test_begin_releases_line_and_is_repeatable() {
        let input = PinMock::new(&[]);
        let output = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low),
        ]);
        let mut driver = LancDriver::new(input, output, counting_clock(), LancConfig::default());

        driver.begin();
        assert_eq!(driver.mode, DriverMode::Armed);
        driver.begin();
        assert_eq!(driver.mode, DriverMode::Armed);
        let (mut input, mut output, _) = driver.release();
        input.done();
        output.done();
    }

    #[test]
    fn test_record_toggle_over_loopback() {
        let bus = SimBus::loopback(Camera::pal(1_000));
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());

        driver.begin();
        driver.record_toggle();
        assert!(driver.cycle());

        let response = driver.last_response().unwrap();
        assert_eq!(response.0[0], 0x18);
        assert_eq!(response.0[1], 0x33);
        assert_eq!(driver.responses().len(), 4);
        assert!(driver.responses().iter().all(|f| *f == response));
        assert_eq!(driver.cycles_good, 1);
        assert_eq!(driver.desyncs, 0);
    }

    #[test]
    fn test_zoom_zero_leaves_staged_frame() {
        let input = PinMock::new(&[]);
        let output = PinMock::new(&[]);
        let mut driver = LancDriver::new(input, output, counting_clock(), LancConfig::default());

        driver.zoom(8).unwrap();
        let staged = driver.staged();
        assert_eq!(staged.0, [0x28, 0x0e, 0, 0, 0, 0, 0, 0]);
        assert_eq!(driver.zoom(0), Err(LancError::ZoomOutOfRange(0)));
        assert_eq!(driver.zoom(-9), Err(LancError::ZoomOutOfRange(-9)));
        assert_eq!(driver.staged(), staged);
        let (mut input, mut output, _) = driver.release();
        input.done();
        output.done();
    }

    #[test]
    fn test_clear_command_is_idempotent() {
        let input = PinMock::new(&[]);
        let output = PinMock::new(&[]);
        let mut driver = LancDriver::new(input, output, counting_clock(), LancConfig::default());

        driver.power_down();
        assert_eq!(driver.staged().0[..2], [0x18, 0x5e]);
        driver.clear_command();
        let once = driver.staged();
        driver.clear_command();
        assert_eq!(driver.staged(), once);
        assert_eq!(once, Frame::IDLE);
        let (mut input, mut output, _) = driver.release();
        input.done();
        output.done();
    }

    #[test]
    fn test_command_setters() {
        let input = PinMock::new(&[]);
        let output = PinMock::new(&[]);
        let mut driver = LancDriver::new(input, output, counting_clock(), LancConfig::default());

        driver.focus(true);
        assert_eq!(driver.staged().0[..2], [0x28, 0x45]);
        driver.auto_focus();
        assert_eq!(driver.staged().0[..2], [0x28, 0x41]);
        driver.auto_iris();
        assert_eq!(driver.staged().0[..2], [0x28, 0xaf]);
        driver.iris(false);
        assert_eq!(driver.staged().0[..2], [0x28, 0x53]);
        driver.video_camera_normal_command(0x01);
        assert_eq!(driver.staged().0[..2], [0x18, 0x01]);
        driver.video_camera_special_command(0x02);
        assert_eq!(driver.staged().0[..2], [0x28, 0x02]);
        driver.video_camera_ops_command(0x03);
        assert_eq!(driver.staged().0[..2], [0x38, 0x03]);
        let (mut input, mut output, _) = driver.release();
        input.done();
        output.done();
    }

    #[test]
    fn test_no_output_after_desync_until_begin() {
        let bus = SimBus::loopback(Camera::absent());
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());

        driver.begin();
        driver.record_toggle();
        assert!(!driver.cycle());
        assert_eq!(driver.mode, DriverMode::Desynced);
        assert_eq!(driver.desyncs, 1);
        assert_eq!(driver.last_response(), None);

        let writes = bus.writes();
        assert!(!driver.cycle());
        assert_eq!(driver.exchange(), Err(LancError::NotStarted));
        assert_eq!(bus.writes(), writes);
        assert_eq!(driver.desyncs, 1);

        driver.begin();
        assert_eq!(driver.mode, DriverMode::Armed);
        assert_eq!(bus.writes(), writes + 1);
    }

    #[test]
    fn test_failure_clears_previous_response() {
        let bus = SimBus::loopback(Camera::pal(1_000).frames(6));
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());

        driver.begin();
        assert!(driver.cycle());
        assert!(driver.last_response().is_some());

        // Only frame 5 is left, so the second cycle runs out of frames.
        let err = driver.exchange().unwrap_err();
        assert!(matches!(err, LancError::Desync { repeat: 1, .. }));
        assert_eq!(driver.last_response(), None);
        assert_eq!(driver.responses().len(), 1);
    }

    #[test]
    fn test_prompt_recall_keeps_frame_timing() {
        let camera = Camera::pal(1_000);
        let bus = SimBus::loopback(camera);
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());
        driver.begin();

        assert!(driver.cycle());
        let first = bus.now();
        bus.set_now(first + 1_000);
        assert!(driver.cycle());
        // Frames 1..=4, then 5..=8 with no frame lost in between.
        assert!(bus.now() - first < 4 * FRAME_PERIOD_US + 2 * BIT_DURATION_US);
        assert!(bus.now() > camera.frame_start(8));
    }

    #[test]
    fn test_late_recall_costs_a_frame() {
        let camera = Camera::pal(1_000);
        let bus = SimBus::loopback(camera);
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());
        driver.begin();

        assert!(driver.cycle());
        let first = bus.now();
        bus.set_now(first + MAX_LOOP_GAP_US + 2_000);
        assert!(driver.cycle());
        // A fresh frame gap has to be found, so frame 5 is skipped.
        assert!(bus.now() > camera.frame_start(9));
        assert!(bus.now() < camera.frame_start(10));
    }

    #[test]
    fn test_invalid_repeats_keeps_driver_armed() {
        let bus = SimBus::loopback(Camera::pal(1_000));
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let config = LancConfig {
            repeats: 0,
            ..LancConfig::default()
        };
        let mut driver = LancDriver::new(input, output, clock, config);
        driver.begin();

        assert_eq!(driver.exchange(), Err(LancError::InvalidRepeats(0)));
        assert_eq!(driver.mode, DriverMode::Armed);
        assert_eq!(driver.desyncs, 0);
    }
}
