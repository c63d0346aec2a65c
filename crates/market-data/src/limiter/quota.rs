//! Rolling quota windows.
//!
//! Each window counts requests between aligned wall-clock boundaries
//! (top of the minute, top of the hour, start of the UTC day). Resets are
//! cooperative: callers roll the window before reading it, so no background
//! timer is needed.

use chrono::{DateTime, Duration, DurationRound, Utc};
use log::debug;

/// Granularity of a quota window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WindowKind {
    /// Rolls at the top of each minute
    Minute,
    /// Rolls at the top of each hour
    Hour,
    /// Rolls at the start of each UTC day
    Day,
}

impl WindowKind {
    /// Stable string form for logs and statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// Align a timestamp down to this window's boundary.
    pub fn truncate(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let granularity = match self {
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
        };
        // Truncation only fails on timestamps far outside the representable
        // range; fall back to the raw timestamp in that case.
        now.duration_trunc(granularity).unwrap_or(now)
    }
}

/// Request counter over one rolling window.
///
/// `count` may only be compared against `limit`, never clamped to it:
/// exceeding the limit is detected and rejected by the caller, not
/// truncated here.
#[derive(Clone, Debug)]
pub struct QuotaWindow {
    /// Window granularity
    pub kind: WindowKind,
    /// Requests recorded since `window_start`
    pub count: u32,
    /// Maximum requests allowed per window
    pub limit: u32,
    /// Aligned start of the current window
    pub window_start: DateTime<Utc>,
}

impl QuotaWindow {
    /// Create a window starting at the boundary containing `now`.
    pub fn new(kind: WindowKind, limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            count: 0,
            limit,
            window_start: kind.truncate(now),
        }
    }

    /// Reset the counter if `now` has crossed the window boundary.
    ///
    /// The new start is the aligned boundary, not `now` itself.
    pub fn roll(&mut self, now: DateTime<Utc>) {
        let boundary = self.kind.truncate(now);
        if boundary > self.window_start {
            debug!("{} request counter reset", self.kind.as_str());
            self.count = 0;
            self.window_start = boundary;
        }
    }

    /// Whether the window is at or above its limit.
    pub fn is_exhausted(&self) -> bool {
        self.count >= self.limit
    }

    /// Record one request in the current window.
    pub fn record(&mut self) {
        self.count += 1;
    }

    /// Fraction of the limit consumed.
    pub fn utilization(&self) -> f64 {
        f64::from(self.count) / f64::from(self.limit.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_truncate_aligns_to_boundary() {
        let now = at(10, 42, 37);
        assert_eq!(WindowKind::Minute.truncate(now), at(10, 42, 0));
        assert_eq!(WindowKind::Hour.truncate(now), at(10, 0, 0));
        assert_eq!(WindowKind::Day.truncate(now), at(0, 0, 0));
    }

    #[test]
    fn test_roll_within_window_keeps_count() {
        let mut window = QuotaWindow::new(WindowKind::Minute, 10, at(10, 42, 5));
        window.record();
        window.record();

        window.roll(at(10, 42, 59));
        assert_eq!(window.count, 2);
        assert_eq!(window.window_start, at(10, 42, 0));
    }

    #[test]
    fn test_roll_across_boundary_resets() {
        let mut window = QuotaWindow::new(WindowKind::Minute, 10, at(10, 42, 5));
        for _ in 0..10 {
            window.record();
        }
        assert!(window.is_exhausted());

        window.roll(at(10, 43, 1));
        assert_eq!(window.count, 0);
        assert!(!window.is_exhausted());
        // Start advances to the boundary, not to "now"
        assert_eq!(window.window_start, at(10, 43, 0));
    }

    #[test]
    fn test_day_window_rolls_at_midnight() {
        let mut window = QuotaWindow::new(WindowKind::Day, 2000, at(23, 59, 59));
        window.record();

        window.roll(Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 1).unwrap());
        assert_eq!(window.count, 0);
        assert_eq!(
            window.window_start,
            Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_count_not_clamped_at_limit() {
        let mut window = QuotaWindow::new(WindowKind::Minute, 2, at(10, 0, 0));
        for _ in 0..5 {
            window.record();
        }
        // Exceeding is visible, not truncated
        assert_eq!(window.count, 5);
        assert!(window.is_exhausted());
    }

    #[test]
    fn test_utilization() {
        let mut window = QuotaWindow::new(WindowKind::Hour, 100, at(10, 0, 0));
        for _ in 0..96 {
            window.record();
        }
        assert!(window.utilization() > 0.95);
    }
}
