//! Temporal inclusion window relative to the index date.

use chrono::NaiveDate;
use ihd_criteria::definition::WindowDefinition;
use serde::Serialize;

/// Open interval of day offsets `(lower_exclusive, upper_exclusive)`.
///
/// The default `(-1, 365)` admits day 0 (the index date) through day 364.
/// Every evaluator and activity summary uses the same window instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemporalWindow {
    pub lower_exclusive: i64,
    pub upper_exclusive: i64,
}

impl Default for TemporalWindow {
    fn default() -> Self {
        Self {
            lower_exclusive: -1,
            upper_exclusive: 365,
        }
    }
}

impl From<WindowDefinition> for TemporalWindow {
    fn from(def: WindowDefinition) -> Self {
        Self {
            lower_exclusive: def.lower_exclusive,
            upper_exclusive: def.upper_exclusive,
        }
    }
}

impl TemporalWindow {
    pub fn new(lower_exclusive: i64, upper_exclusive: i64) -> Self {
        Self {
            lower_exclusive,
            upper_exclusive,
        }
    }

    /// Whether a day offset falls strictly inside the window.
    pub fn contains_diff(&self, diff: i64) -> bool {
        self.lower_exclusive < diff && diff < self.upper_exclusive
    }

    pub fn contains(&self, event_date: NaiveDate, index_date: NaiveDate) -> bool {
        self.contains_diff((event_date - index_date).num_days())
    }

    /// As [`contains`](Self::contains), with a missing date excluding the
    /// record.
    pub fn in_window(&self, event_date: Option<NaiveDate>, index_date: Option<NaiveDate>) -> bool {
        match (event_date, index_date) {
            (Some(event), Some(index)) => self.contains(event, index),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn index() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    #[test]
    fn default_window_boundaries() {
        let window = TemporalWindow::default();
        assert!(!window.contains(index() + Duration::days(-1), index()));
        assert!(window.contains(index(), index()));
        assert!(window.contains(index() + Duration::days(364), index()));
        assert!(!window.contains(index() + Duration::days(365), index()));
    }

    #[test]
    fn missing_dates_are_excluded() {
        let window = TemporalWindow::default();
        assert!(!window.in_window(None, Some(index())));
        assert!(!window.in_window(Some(index()), None));
        assert!(window.in_window(Some(index()), Some(index())));
    }

    #[test]
    fn custom_window_allows_lookback() {
        let window = TemporalWindow::new(-31, 31);
        assert!(window.contains(index() - Duration::days(30), index()));
        assert!(!window.contains(index() - Duration::days(31), index()));
    }

    proptest! {
        #[test]
        fn contains_matches_offset_predicate(offset in -1000i64..1000, lower in -400i64..0, span in 1i64..800) {
            let window = TemporalWindow::new(lower, lower + span);
            let event = index() + Duration::days(offset);
            prop_assert_eq!(
                window.contains(event, index()),
                lower < offset && offset < lower + span
            );
        }

        #[test]
        fn shifting_both_dates_preserves_membership(offset in -500i64..800, shift in -5000i64..5000) {
            let window = TemporalWindow::default();
            let idx = index() + Duration::days(shift);
            prop_assert_eq!(
                window.contains(idx + Duration::days(offset), idx),
                window.contains(index() + Duration::days(offset), index())
            );
        }
    }
}
