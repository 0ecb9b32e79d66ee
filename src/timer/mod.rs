//! Scheduling contract and clock helpers for the LANC driver.
//!
//! The driver blocks inside [`cycle()`](crate::driver::LancDriver::cycle) for the
//! whole exchange and must be called again promptly. This module makes that
//! contract explicit, and helps build a [`Clock`] out of a hardware counter:
//!
//! - [`MAX_LOOP_GAP_US`]: longest gap between two cycles that keeps the frame timing
//! - [`RESYNC_BACKOFF_US`]: pause before re-arming after a lost synchronization
//! - [`CounterClock`]: microsecond clock from a free-running 16-bit timer counter
//! - [`counter_hz`] / [`const_counter_hz`]: counter rate for a CPU clock and prescaler
//! - `service_lanc` / `run_lanc_loop`: blocking driver loop for `DelayNs` (feature `delay-loop`)
//!
//! Common AVR settings at 16 MHz: (For use with [`counter_hz`] and [`CounterClock`])
//!
//! | PRESCALER | COUNTER RATE | Resolution | Wraps after |
//! |-----------|--------------|------------|-------------|
//! |         8 |        2 MHz |     0.5 µs |    32.8 ms  |
//! |        64 |      250 kHz |       4 µs |   262.1 ms  |
//!
//! A prescaler of 64 is the coarsest that still resolves a bit slot well
//! enough (see [`resolves_bit_slots`]).

use crate::clock::Clock;
use crate::consts::{FRAME_GAP_MIN_US, MAX_SLOT_OVERRUN_US};

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

/// Longest time between the end of one cycle and the start of the next for
/// which the driver keeps its frame timing.
///
/// A full frame gap is at least [`FRAME_GAP_MIN_US`]; calling back within this
/// time guarantees the driver is listening before the next frame starts.
pub const MAX_LOOP_GAP_US: u32 = FRAME_GAP_MIN_US - 1_000;

/// Time to leave the link alone after a lost synchronization before calling
/// `begin()` again. One PAL frame period.
pub const RESYNC_BACKOFF_US: u32 = 20_000;

/// Counter rate of a timer clocked from `f_cpu` through `prescaler`.
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 8, 64, 256)
pub fn counter_hz(f_cpu: u32, prescaler: u32) -> u32 {
    f_cpu / prescaler
}

/// Compile-time [`counter_hz`].
pub const fn const_counter_hz(f_cpu: u32, prescaler: u32) -> u32 {
    f_cpu / prescaler
}

/// Whether a counter running at `counter_hz` is fine enough to time bit slots.
///
/// Two ticks must fit in the slot overrun tolerance.
pub const fn resolves_bit_slots(counter_hz: u32) -> bool {
    counter_hz != 0 && 2 * 1_000_000u32.div_ceil(counter_hz) <= MAX_SLOT_OVERRUN_US
}

/// A [`Clock`] built on a free-running 16-bit hardware counter.
///
/// The counter must be read at least once per wrap (65536 ticks); the driver
/// reads its clock continuously while a cycle runs, so this only constrains the
/// time spent between cycles.
///
/// # Example
/// ```rust
/// use lanc::clock::Clock;
/// use lanc::timer::{CounterClock, const_counter_hz};
///
/// // A timer at 16 MHz / 8, read through some HAL call.
/// let mut tcnt: u16 = 0;
/// let mut clock = CounterClock::new(move || { tcnt = tcnt.wrapping_add(200); tcnt }, const_counter_hz(16_000_000, 8));
/// assert_eq!(clock.now_us(), 100);
/// ```
#[derive(Debug)]
pub struct CounterClock<F>
where
    F: FnMut() -> u16,
{
    read: F,
    counter_hz: u32,
    last: u16,
    /// Ticks not yet worth a whole second, always below `counter_hz`.
    pending: u64,
    /// Microseconds of the whole seconds counted so far, wrapping.
    seconds_us: u32,
}

impl<F> CounterClock<F>
where
    F: FnMut() -> u16,
{
    /// Wraps `read`, which returns the raw counter value, for a counter
    /// running at `counter_hz`. The counter's current value is time zero.
    pub fn new(mut read: F, counter_hz: u32) -> Self {
        let last = read();
        Self {
            read,
            counter_hz: counter_hz.max(1),
            last,
            pending: 0,
            seconds_us: 0,
        }
    }

    /// Largest interval between two reads that does not lose a wrap.
    ///
    /// Saturates at `u32::MAX` for very slow counters.
    pub fn max_read_interval_us(&self) -> u32 {
        u32::try_from(u64::from(u16::MAX) * 1_000_000 / u64::from(self.counter_hz)).unwrap_or(u32::MAX)
    }
}

impl<F> Clock for CounterClock<F>
where
    F: FnMut() -> u16,
{
    fn now_us(&mut self) -> u32 {
        let raw = (self.read)();
        let hz = u64::from(self.counter_hz);
        self.pending += u64::from(raw.wrapping_sub(self.last));
        self.last = raw;

        let seconds = (self.pending / hz) as u32;
        self.pending %= hz;
        self.seconds_us = self.seconds_us.wrapping_add(seconds.wrapping_mul(1_000_000));
        // `pending` is below `counter_hz` here, so the product fits in a u64.
        self.seconds_us.wrapping_add((self.pending * 1_000_000 / hz) as u32)
    }
}
