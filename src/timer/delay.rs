use crate::clock::Clock;
use crate::driver::{DriverMode, LancDriver};
use crate::timer::{MAX_LOOP_GAP_US, RESYNC_BACKOFF_US};
use embedded_hal::delay::DelayNs;

/// Runs one iteration of the LANC service loop.
///
/// Arms the driver if needed, runs a cycle, then waits: `idle_us` after a good
/// cycle (clamped to [`MAX_LOOP_GAP_US`] so the frame timing survives), or
/// [`RESYNC_BACKOFF_US`] after a failed one, followed by `begin()`.
///
/// # Arguments
/// - `driver`: A mutable reference to a `LancDriver` instance.
/// - `delay`: A delay provider implementing `DelayNs`, typically from the HAL.
/// - `idle_us`: Time to give to other work between two cycles.
///
/// # Returns
/// Whether the cycle succeeded.
pub fn service_lanc<D: DelayNs, IN, OUT, CLK>(
    driver: &mut LancDriver<IN, OUT, CLK>,
    delay: &mut D,
    idle_us: u32,
) -> bool
where
    IN: embedded_hal::digital::InputPin,
    OUT: embedded_hal::digital::OutputPin,
    CLK: Clock,
{
    if driver.mode != DriverMode::Armed {
        driver.begin();
    }
    if driver.cycle() {
        if idle_us > 0 {
            delay.delay_us(idle_us.min(MAX_LOOP_GAP_US));
        }
        true
    } else {
        delay.delay_us(RESYNC_BACKOFF_US);
        driver.begin();
        false
    }
}

/// Runs a blocking loop that keeps the LANC link serviced.
///
/// This is the simplest way to own the scheduling contract: nothing else runs
/// except inside `idle_us`. Commands can be staged from `between`, which is
/// called after every cycle with its outcome.
///
/// # Example
/// ```rust,ignore
/// use lanc::timer::run_lanc_loop;
/// let mut driver = LancDriver::new(input, output, micros, LancConfig::default());
/// run_lanc_loop(&mut driver, &mut delay, 1_000, |driver, ok| {
///     if buttons.zoom_in() { let _ = driver.zoom(4); } else { driver.clear_command(); }
/// });
/// ```
///
/// # Notes
/// - This loop will never return; it is intended for single-purpose firmware.
/// - Keep `between` short: time spent there counts against [`MAX_LOOP_GAP_US`].
pub fn run_lanc_loop<D: DelayNs, IN, OUT, CLK>(
    driver: &mut LancDriver<IN, OUT, CLK>,
    delay: &mut D,
    idle_us: u32,
    mut between: impl FnMut(&mut LancDriver<IN, OUT, CLK>, bool),
) -> !
where
    IN: embedded_hal::digital::InputPin,
    OUT: embedded_hal::digital::OutputPin,
    CLK: Clock,
{
    loop {
        let ok = service_lanc(driver, delay, idle_us);
        between(driver, ok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinePolarity;
    use crate::driver::LancConfig;
    use crate::sim::{Camera, SimBus};

    #[test]
    fn test_service_arms_and_cycles() {
        let bus = SimBus::loopback(Camera::pal(1_000));
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());
        let mut delay = bus.delay();

        driver.auto_focus();
        assert!(service_lanc(&mut driver, &mut delay, 500));
        assert_eq!(driver.mode, DriverMode::Armed);
        assert_eq!(driver.last_response().map(|f| f.code()), Some(0x41));

        let before = bus.now();
        assert!(service_lanc(&mut driver, &mut delay, 500));
        assert_eq!(driver.cycles_good, 2);
        assert!(bus.now() > before);
    }

    #[test]
    fn test_service_clamps_idle_time() {
        let bus = SimBus::loopback(Camera::pal(1_000));
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());
        let mut delay = bus.delay();

        assert!(service_lanc(&mut driver, &mut delay, 1_000_000));
        let end = bus.now();
        // Only MAX_LOOP_GAP_US was slept, so the next cycle keeps the timing.
        assert!(service_lanc(&mut driver, &mut delay, 0));
        assert!(bus.now() - end < 4 * crate::sim::FRAME_PERIOD_US);
    }

    #[test]
    fn test_service_rearms_after_failure() {
        let bus = SimBus::loopback(Camera::absent());
        let (input, output, clock) = bus.pins(LinePolarity::default());
        let mut driver = LancDriver::new(input, output, clock, LancConfig::default());
        let mut delay = bus.delay();

        assert!(!service_lanc(&mut driver, &mut delay, 0));
        assert_eq!(driver.desyncs, 1);
        assert_eq!(driver.mode, DriverMode::Armed);
    }
}
