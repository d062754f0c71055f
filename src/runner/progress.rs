//! Progress-stream parsing.
//!
//! ffmpeg's `-progress` channel emits `key=value` lines; the only key used
//! here is `out_time=HH:MM:SS.ffffff`. Positions are clamped to the probed
//! duration and only strictly positive increments are forwarded.

/// Receives progress increments in seconds of media
pub trait ProgressSink {
    fn advance(&mut self, seconds: f64);
}

impl<F: FnMut(f64)> ProgressSink for F {
    fn advance(&mut self, seconds: f64) {
        self(seconds)
    }
}

/// `HH:MM:SS.ffffff` to seconds; negative or malformed clocks yield `None`
pub fn parse_clock(clock: &str) -> Option<f64> {
    let mut parts = clock.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Extract the elapsed media time from one progress line
pub fn parse_progress_line(line: &str) -> Option<f64> {
    line.trim().strip_prefix("out_time=").and_then(parse_clock)
}

/// Turns absolute positions into bounded, monotonic increments
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    duration: f64,
    reported: f64,
}

impl ProgressTracker {
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            duration: duration_seconds.max(0.0),
            reported: 0.0,
        }
    }

    pub fn reported(&self) -> f64 {
        self.reported
    }

    /// Increment to forward for a new position, if any
    pub fn observe(&mut self, position: f64) -> Option<f64> {
        let position = position.clamp(0.0, self.duration);
        if position > self.reported {
            let delta = position - self.reported;
            self.reported = position;
            Some(delta)
        } else {
            None
        }
    }

    /// Remaining increment that brings the total to the full duration
    pub fn complete(&mut self) -> Option<f64> {
        self.observe(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("00:00:00.000000"), Some(0.0));
        assert_eq!(parse_clock("01:02:03.500000"), Some(3723.5));
        assert_eq!(parse_clock("-577014:32:22.775808"), None);
        assert_eq!(parse_clock("N/A"), None);
        assert_eq!(parse_clock("1:2"), None);
    }

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("out_time=00:00:10.250000\n"), Some(10.25));
        assert_eq!(parse_progress_line("out_time_us=10250000"), None);
        assert_eq!(parse_progress_line("out_time_ms=10250000"), None);
        assert_eq!(parse_progress_line("progress=continue"), None);
        assert_eq!(parse_progress_line("out_time=N/A"), None);
    }

    #[test]
    fn test_tracker_ignores_noise_and_clamps() {
        let mut tracker = ProgressTracker::new(10.0);
        assert_eq!(tracker.observe(4.0), Some(4.0));
        assert_eq!(tracker.observe(4.0), None);
        assert_eq!(tracker.observe(3.0), None);
        assert_eq!(tracker.observe(25.0), Some(6.0));
        assert_eq!(tracker.observe(30.0), None);
        assert_eq!(tracker.reported(), 10.0);
        assert_eq!(tracker.complete(), None);
    }

    #[test]
    fn test_fallback_duration_reaches_completion() {
        let mut tracker = ProgressTracker::new(100.0);
        let mut total = 0.0;
        for position in [2.0, 5.0, 7.5] {
            total += tracker.observe(position).unwrap_or(0.0);
        }
        total += tracker.complete().unwrap_or(0.0);
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |delta: f64| seen.push(delta);
            sink.advance(1.5);
        }
        assert_eq!(seen, vec![1.5]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_increments_positive_and_bounded(
            duration in 0.0f64..10_000.0,
            positions in proptest::collection::vec(-100.0f64..20_000.0, 0..64),
        ) {
            let mut tracker = ProgressTracker::new(duration);
            let mut total = 0.0;
            for position in positions {
                if let Some(delta) = tracker.observe(position) {
                    prop_assert!(delta > 0.0);
                    total += delta;
                }
            }
            prop_assert!(total <= duration + 1e-9);
        }
    }
}
