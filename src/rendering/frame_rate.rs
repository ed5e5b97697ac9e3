//! Wall-clock frame rate counter.

use chrono::{Local, Timelike};

/// Counts base-frame composites per wall-clock second.
///
/// The rate reported is the count of the last completed second, so it lags
/// by up to one second and reads 0 until the first rollover.
#[derive(Debug)]
pub struct FrameRateMonitor {
    current_second: Option<u32>,
    count: u32,
    rate: u32,
    clock: fn() -> u32,
}

/// Second-of-minute of the local wall clock.
pub fn local_second() -> u32 {
    Local::now().second()
}

impl Default for FrameRateMonitor {
    fn default() -> Self {
        Self::with_clock(local_second)
    }
}

impl FrameRateMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monitor reading seconds from `clock` instead of the local time.
    pub fn with_clock(clock: fn() -> u32) -> Self {
        Self {
            current_second: None,
            count: 0,
            rate: 0,
            clock,
        }
    }

    /// Swap the clock, keeping the counts gathered so far.
    pub fn set_clock(&mut self, clock: fn() -> u32) {
        self.clock = clock;
    }

    /// Record a frame at the clock's current second.
    pub fn record_frame(&mut self) -> Option<u32> {
        let second = (self.clock)();
        self.record_frame_at(second)
    }

    /// Record a frame during wall-clock second `second`.
    ///
    /// Returns the new rate when this frame starts a new second.
    pub fn record_frame_at(&mut self, second: u32) -> Option<u32> {
        match self.current_second {
            Some(current) if current == second => {
                self.count += 1;
                None
            },
            Some(_) => {
                self.rate = self.count;
                self.current_second = Some(second);
                self.count = 1;
                Some(self.rate)
            },
            None => {
                self.current_second = Some(second);
                self.count = 1;
                None
            },
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_previous_second_count() {
        let mut monitor = FrameRateMonitor::new();
        for _ in 0..30 {
            assert_eq!(monitor.record_frame_at(5), None);
        }
        assert_eq!(monitor.rate(), 0);

        assert_eq!(monitor.record_frame_at(6), Some(30));
        assert_eq!(monitor.rate(), 30);

        monitor.record_frame_at(6);
        assert_eq!(monitor.record_frame_at(7), Some(2));
    }

    #[test]
    fn minute_wrap_counts_as_rollover() {
        let mut monitor = FrameRateMonitor::new();
        monitor.record_frame_at(59);
        monitor.record_frame_at(59);
        assert_eq!(monitor.record_frame_at(0), Some(2));
    }

    #[test]
    fn injected_clock_drives_record_frame() {
        fn fixed() -> u32 {
            42
        }
        let mut monitor = FrameRateMonitor::with_clock(fixed);
        assert_eq!(monitor.record_frame(), None);
        assert_eq!(monitor.record_frame(), None);
        assert_eq!(monitor.record_frame_at(43), Some(2));
    }

    #[test]
    fn live_clock_records() {
        let mut monitor = FrameRateMonitor::new();
        monitor.record_frame();
        monitor.record_frame();
        assert!(monitor.rate() <= 2);
    }
}
