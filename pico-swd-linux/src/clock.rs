use std::time::{Duration, Instant};

use pico_swd::Clock;

/// Delays backed by the standard library.
///
/// Sub-millisecond delays spin, the scheduler cannot sleep that briefly with
/// any accuracy.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdClock;

impl Clock for StdClock {
    fn delay_us(&mut self, us: u32) {
        let deadline = Instant::now() + Duration::from_micros(us.into());
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms.into()));
    }

    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delays_are_at_least_requested() {
        let mut clock = StdClock;

        let start = Instant::now();
        clock.delay_us(200);
        assert!(start.elapsed() >= Duration::from_micros(200));

        let start = Instant::now();
        clock.delay_ms(2);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}
