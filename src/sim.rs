//! Simulated LANC bus for tests.
//!
//! A [`SimBus`] owns simulated time and a model of the camera. The pins and
//! clock it hands out borrow it, so a test can inspect the bus while a link or
//! driver is using it. Every clock read advances time by [`SimBus::step`],
//! which is what makes busy-waits progress.

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::clock::Clock;
use crate::consts::{BIT_DURATION_US, FRAME_LEN};
use crate::link::{LancLink, LinePolarity};

/// Stop period the simulated camera leaves between bytes.
pub(crate) const STOP_US: u32 = 300;
/// Start of one byte to the start of the next.
pub(crate) const BYTE_SPACING_US: u32 = 9 * BIT_DURATION_US + STOP_US;
/// PAL frame period.
pub(crate) const FRAME_PERIOD_US: u32 = 20_000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CameraKind {
    Absent,
    StuckLow,
    Pal,
}

/// What the camera does to the line.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Camera {
    kind: CameraKind,
    first_frame_at: u32,
    status: [u8; 4],
    frames: Option<u32>,
    dropped: Option<(u32, u32)>,
}

impl Camera {
    /// Nothing connected: the line idles high forever.
    pub(crate) fn absent() -> Self {
        Self {
            kind: CameraKind::Absent,
            first_frame_at: 0,
            status: [0; 4],
            frames: None,
            dropped: None,
        }
    }

    /// A shorted line.
    pub(crate) fn stuck_low() -> Self {
        Self {
            kind: CameraKind::StuckLow,
            ..Self::absent()
        }
    }

    /// A PAL camera whose first frame starts at `first_frame_at`.
    pub(crate) fn pal(first_frame_at: u32) -> Self {
        Self {
            kind: CameraKind::Pal,
            first_frame_at,
            ..Self::absent()
        }
    }

    /// Status bytes the camera sends in bytes 4..7.
    pub(crate) fn with_status(mut self, status: [u8; 4]) -> Self {
        self.status = status;
        self
    }

    /// The camera goes silent after `frames` frames.
    pub(crate) fn frames(mut self, frames: u32) -> Self {
        self.frames = Some(frames);
        self
    }

    /// The camera skips the start bit of `byte` in `frame`.
    pub(crate) fn dropping(mut self, frame: u32, byte: u32) -> Self {
        self.dropped = Some((frame, byte));
        self
    }

    pub(crate) fn frame_start(&self, frame: u32) -> u32 {
        self.first_frame_at + frame * FRAME_PERIOD_US
    }

    pub(crate) fn byte_start(&self, frame: u32, byte: u32) -> u32 {
        self.frame_start(frame) + byte * BYTE_SPACING_US
    }

    fn asserts(&self, t: u32) -> bool {
        match self.kind {
            CameraKind::Absent => false,
            CameraKind::StuckLow => true,
            CameraKind::Pal => {
                if t < self.first_frame_at {
                    return false;
                }
                let rel = t - self.first_frame_at;
                let frame = rel / FRAME_PERIOD_US;
                if self.frames.is_some_and(|n| frame >= n) {
                    return false;
                }
                let in_frame = rel % FRAME_PERIOD_US;
                let byte = in_frame / BYTE_SPACING_US;
                if byte >= FRAME_LEN as u32 {
                    return false;
                }
                let offset = in_frame % BYTE_SPACING_US;
                if offset < BIT_DURATION_US {
                    return self.dropped != Some((frame, byte));
                }
                if offset < 9 * BIT_DURATION_US && byte >= 4 {
                    let bit = (offset - BIT_DURATION_US) / BIT_DURATION_US;
                    return self.status[(byte - 4) as usize] & (1 << bit) != 0;
                }
                false
            }
        }
    }
}

/// Simulated time, camera and wiring.
pub(crate) struct SimBus {
    now: Cell<u32>,
    step: u32,
    camera: Camera,
    loopback: bool,
    polarity: Cell<LinePolarity>,
    pin_high: Cell<bool>,
    writes: Cell<u32>,
}

impl SimBus {
    /// Output pin not connected to the line: the controller only listens.
    pub(crate) fn new(camera: Camera) -> Self {
        Self {
            now: Cell::new(0),
            step: 2,
            camera,
            loopback: false,
            polarity: Cell::new(LinePolarity::default()),
            pin_high: Cell::new(false),
            writes: Cell::new(0),
        }
    }

    /// Output wired to the line, so the input reads back what the controller drives.
    pub(crate) fn loopback(camera: Camera) -> Self {
        Self {
            loopback: true,
            ..Self::new(camera)
        }
    }

    /// A link on this bus, wired with `polarity`.
    pub(crate) fn link(&self, polarity: LinePolarity) -> LancLink<SimInput<'_>, SimOutput<'_>, SimClock<'_>> {
        let (input, output, clock) = self.pins(polarity);
        LancLink::new(input, output, clock, polarity)
    }

    /// Raw pins and clock, for building a driver.
    pub(crate) fn pins(&self, polarity: LinePolarity) -> (SimInput<'_>, SimOutput<'_>, SimClock<'_>) {
        self.polarity.set(polarity);
        self.pin_high.set(!polarity.output_active_high);
        (SimInput(self), SimOutput(self), SimClock(self))
    }

    #[cfg_attr(not(feature = "delay-loop"), allow(dead_code))]
    pub(crate) fn delay(&self) -> SimDelay<'_> {
        SimDelay(self)
    }

    pub(crate) fn step(&self) -> u32 {
        self.step
    }

    pub(crate) fn now(&self) -> u32 {
        self.now.get()
    }

    pub(crate) fn set_now(&self, t: u32) {
        self.now.set(t);
    }

    /// Number of writes to the output pin so far.
    pub(crate) fn writes(&self) -> u32 {
        self.writes.get()
    }

    pub(crate) fn asserted_by_controller(&self) -> bool {
        self.pin_high.get() == self.polarity.get().output_active_high
    }

    fn line_low(&self) -> bool {
        self.camera.asserts(self.now.get()) || (self.loopback && self.asserted_by_controller())
    }
}

pub(crate) struct SimInput<'a>(&'a SimBus);

pub(crate) struct SimOutput<'a>(&'a SimBus);

pub(crate) struct SimClock<'a>(&'a SimBus);

#[cfg_attr(not(feature = "delay-loop"), allow(dead_code))]
pub(crate) struct SimDelay<'a>(&'a SimBus);

impl ErrorType for SimInput<'_> {
    type Error = Infallible;
}

impl InputPin for SimInput<'_> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.line_low() == self.0.polarity.get().input_inverted)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

impl ErrorType for SimOutput<'_> {
    type Error = Infallible;
}

impl OutputPin for SimOutput<'_> {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.pin_high.set(false);
        self.0.writes.set(self.0.writes.get() + 1);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.pin_high.set(true);
        self.0.writes.set(self.0.writes.get() + 1);
        Ok(())
    }
}

impl Clock for SimClock<'_> {
    fn now_us(&mut self) -> u32 {
        let t = self.0.now.get().wrapping_add(self.0.step);
        self.0.now.set(t);
        t
    }
}

impl DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        let us = ns.div_ceil(1_000);
        self.0.now.set(self.0.now.get().wrapping_add(us));
    }
}
