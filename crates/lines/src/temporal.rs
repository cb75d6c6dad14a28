use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Where today falls relative to a line's `[date_start, date_end]` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    In,
    After,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::Before, Position::In, Position::After];
}

/// Classify `today` against a date span. An absent end never ends.
pub fn classify(today: NaiveDate, date_start: NaiveDate, date_end: Option<NaiveDate>) -> Position {
    if today < date_start {
        return Position::Before;
    }
    match date_end {
        Some(end) if today > end => Position::After,
        _ => Position::In,
    }
}

/// Source of "today" for state and permission evaluation.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date (tests, replays, `--today` overrides).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_classify_boundaries() {
        let start = d(2025, 1, 1);
        let end = Some(d(2025, 12, 31));
        assert_eq!(classify(d(2024, 12, 31), start, end), Position::Before);
        assert_eq!(classify(start, start, end), Position::In);
        assert_eq!(classify(d(2025, 12, 31), start, end), Position::In);
        assert_eq!(classify(d(2026, 1, 1), start, end), Position::After);
    }

    #[test]
    fn test_open_ended_never_after() {
        assert_eq!(classify(d(2099, 1, 1), d(2025, 1, 1), None), Position::In);
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(d(2025, 6, 1)).today(), d(2025, 6, 1));
    }
}
