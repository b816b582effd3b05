//! Progress display helpers

use std::time::Duration;

/// Nominal request cost added to every chunk when estimating time left
pub const NOMINAL_CHUNK_COST: Duration = Duration::from_millis(250);

const UNITS: &[(&str, f64)] = &[
    ("year", 365.0 * 86_400.0),
    ("month", 30.0 * 86_400.0),
    ("day", 86_400.0),
    ("hour", 3_600.0),
    ("minute", 60.0),
];

/// Estimate how long fetching `remaining` records will take
///
/// Each chunk of `chunk_size` records costs the throttle delay plus
/// [`NOMINAL_CHUNK_COST`]. A partial last chunk counts in proportion.
///
/// # Examples
///
/// ```
/// use acquisition::utils::estimate_time_left;
/// use std::time::Duration;
///
/// let left = estimate_time_left(100, 50, Duration::from_millis(1000));
/// assert_eq!(left, Duration::from_millis(2500));
/// ```
pub fn estimate_time_left(remaining: u64, chunk_size: usize, chunk_delay: Duration) -> Duration {
    let chunk_size = chunk_size.max(1) as f64;
    let per_chunk = chunk_delay + NOMINAL_CHUNK_COST;
    per_chunk.mul_f64(remaining as f64 / chunk_size)
}

/// Render a duration as the largest whole unit, e.g. "3 hours" or "1 minute"
///
/// Units run from years down to seconds; a unit is used once the duration
/// exceeds one of it, and the count is rounded.
pub fn format_time_left(left: Duration) -> String {
    let seconds = left.as_secs_f64();
    for (unit, size) in UNITS {
        let count = seconds / size;
        if count > 1.0 {
            return pluralize(unit, count.round() as u64);
        }
    }
    pluralize("second", seconds.round() as u64)
}

fn pluralize(unit: &str, count: u64) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
