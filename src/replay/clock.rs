use std::time::Duration;
use tokio::time::Instant;

/// The pair of anchors every session uses to turn capture offsets into
/// replay delays.
#[derive(Debug, Clone, Copy)]
pub struct ReplayClock {
    first_capture_time: f64,
    replay_start: Instant,
}

impl ReplayClock {
    pub fn new(first_capture_time: f64, replay_start: Instant) -> Self {
        Self {
            first_capture_time,
            replay_start,
        }
    }

    /// `(capture_time - first_capture_time) - (now - replay_start)`,
    /// clamped at zero and saturating at `Duration::MAX`.
    pub fn delay_at(&self, capture_time: f64, now: Instant) -> Duration {
        let capture_elapsed = capture_time - self.first_capture_time;
        let replay_elapsed = now.saturating_duration_since(self.replay_start).as_secs_f64();
        let delay = capture_elapsed - replay_elapsed;
        if delay > 0.0 {
            Duration::try_from_secs_f64(delay).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    pub fn delay_for(&self, capture_time: f64) -> Duration {
        self.delay_at(capture_time, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_reproduces_capture_spacing() {
        let start = Instant::now();
        let clock = ReplayClock::new(100.0, start);

        assert_eq!(clock.delay_at(100.0, start), Duration::ZERO);
        assert_eq!(clock.delay_at(102.0, start), Duration::from_secs(2));
        assert_eq!(
            clock.delay_at(102.0, start + Duration::from_millis(500)),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_delay_catches_up_when_behind() {
        let start = Instant::now();
        let clock = ReplayClock::new(100.0, start);

        assert_eq!(clock.delay_at(101.0, start + Duration::from_secs(3)), Duration::ZERO);
        assert_eq!(clock.delay_at(99.0, start), Duration::ZERO);
    }

    #[test]
    fn test_delay_saturates_far_in_the_future() {
        let start = Instant::now();
        let clock = ReplayClock::new(100.0, start);

        assert_eq!(clock.delay_at(1e300, start), Duration::MAX);
        assert_eq!(clock.delay_at(f64::NAN, start), Duration::ZERO);
        assert_eq!(clock.delay_at(f64::NEG_INFINITY, start), Duration::ZERO);
    }
}
