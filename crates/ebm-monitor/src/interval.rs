use std::time::Duration;

use rand::Rng;

/// Parse an interval string into a [`Duration`].
///
/// Accepts either:
/// - Human-readable shorthand via `humantime` (e.g. "5s", "1m", "1m30s")
/// - Raw seconds as a plain integer (e.g. "300")
pub fn parse_interval(s: &str) -> Option<Duration> {
    let s = s.trim();

    if let Ok(d) = humantime::parse_duration(s) {
        return Some(d);
    }

    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    None
}

/// Minimum allowed poll interval and request timeout: 1 second.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum allowed poll interval and request timeout: 1 day.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// A duration drawn uniformly from `[0.5 * base, 1.5 * base]`.
pub fn jittered(base: Duration) -> Duration {
    let factor = rand::rng().random_range(0.5..=1.5);
    base.mul_f64(factor)
}
