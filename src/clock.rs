//! Microsecond time source used for all bit timing.
//!
//! The driver never sleeps: it busy-waits against a free-running counter. Any
//! monotonic microsecond counter works, as long as it is read with wrapping
//! arithmetic (like Arduino's `micros()`, which wraps after ~71 minutes).

/// A free-running, wrapping microsecond counter.
///
/// Implemented for any `FnMut() -> u32`, so a HAL's timer read can be passed
/// in directly:
///
/// ```rust
/// use lanc::clock::Clock;
///
/// let mut t = 0u32;
/// let mut clock = move || {
///     t = t.wrapping_add(4);
///     t
/// };
/// assert_eq!(clock.now_us(), 4);
/// ```
pub trait Clock {
    /// Current time in microseconds. Wraps at `u32::MAX`.
    fn now_us(&mut self) -> u32;
}

impl<F> Clock for F
where
    F: FnMut() -> u32,
{
    fn now_us(&mut self) -> u32 {
        self()
    }
}
