//! Cell-fill policy: when a computed value may be written into a cell.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};

/// Source of "today" for window gating.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Reads the local calendar date.
#[cfg(feature = "system-clock")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "system-clock")]
impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Always reports the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Inclusive date range a metric is aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// First to last calendar day of `month` in `year`.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start,
            end: next.pred_opt()?,
        })
    }

    /// The calendar month containing `date`.
    pub fn containing_month(date: NaiveDate) -> Option<Self> {
        Self::month(date.year(), date.month())
    }

    /// `start ..= start + days`.
    pub fn days_from(start: NaiveDate, days: u32) -> Self {
        Self {
            start,
            end: start + Duration::days(i64::from(days)),
        }
    }

    /// Long-running window from `start` up to `today`.
    pub fn until(start: NaiveDate, today: NaiveDate) -> Self {
        Self { start, end: today }
    }

    /// At least one full day has passed since the window closed.
    pub fn has_elapsed(&self, today: NaiveDate) -> bool {
        today > self.end
    }

    /// `today` is on or after the first day of the window.
    pub fn has_started(&self, today: NaiveDate) -> bool {
        today >= self.start
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// How a bound column treats a cell that already holds a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Written once, then never touched again.
    Once,
    /// Recomputed every run; written only when the value changed.
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillDecision {
    /// Leave the cell as it is.
    Skip,
    /// Compute the value and write it.
    Fill,
    /// The cell is wanted but its window is still open.
    Defer,
}

/// Decide what to do with one cell.
///
/// `gate` is the window a bounded metric must wait for; `None` for values that
/// do not depend on a closed window.
pub fn decide(present: bool, mode: FillMode, gate: Option<&Window>, today: NaiveDate) -> FillDecision {
    match mode {
        FillMode::Once if present => FillDecision::Skip,
        FillMode::Once => match gate {
            Some(window) if !window.has_elapsed(today) => FillDecision::Defer,
            _ => FillDecision::Fill,
        },
        FillMode::Live => match gate {
            Some(window) if !window.has_started(today) => FillDecision::Defer,
            _ => FillDecision::Fill,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_windows_cover_the_last_day() {
        assert_eq!(Window::month(2016, 2), Some(Window::new(d(2016, 2, 1), d(2016, 2, 29))));
        assert_eq!(
            Window::month(2015, 12),
            Some(Window::new(d(2015, 12, 1), d(2015, 12, 31)))
        );
        assert_eq!(Window::month(2015, 13), None);
        assert_eq!(
            Window::containing_month(d(2017, 4, 18)),
            Window::month(2017, 4)
        );
    }

    #[test]
    fn elapsed_means_a_full_day_after_the_end() {
        let w = Window::days_from(d(2016, 3, 1), 30);
        assert_eq!(w.end, d(2016, 3, 31));
        assert!(!w.has_elapsed(d(2016, 3, 30)));
        assert!(!w.has_elapsed(d(2016, 3, 31)));
        assert!(w.has_elapsed(d(2016, 4, 1)));
    }

    #[test]
    fn once_cells_are_never_touched_when_present() {
        let open = Window::month(2016, 3).unwrap();
        let today = d(2016, 5, 1);
        assert_eq!(decide(true, FillMode::Once, None, today), FillDecision::Skip);
        assert_eq!(decide(true, FillMode::Once, Some(&open), today), FillDecision::Skip);
        assert_eq!(decide(false, FillMode::Once, Some(&open), today), FillDecision::Fill);
        assert_eq!(
            decide(false, FillMode::Once, Some(&open), d(2016, 3, 31)),
            FillDecision::Defer
        );
    }

    #[test]
    fn live_cells_wait_only_for_the_start() {
        let running = Window::until(d(2016, 3, 1), d(2016, 3, 10));
        assert_eq!(
            decide(true, FillMode::Live, Some(&running), d(2016, 3, 10)),
            FillDecision::Fill
        );
        let future = Window::until(d(2016, 3, 1), d(2016, 2, 20));
        assert_eq!(
            decide(false, FillMode::Live, Some(&future), d(2016, 2, 20)),
            FillDecision::Defer
        );
    }
}
