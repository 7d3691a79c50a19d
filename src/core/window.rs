use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use crate::utils::error::{FetcherError, Result};

/// Inclusive range of observation dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(FetcherError::ConfigError {
                message: format!("window start {} is after end {}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    /// The `days` dates ending at `end`, inclusive.
    pub fn ending_at(end: NaiveDate, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(FetcherError::InvalidConfigValueError {
                field: "WINDOW_DAYS".to_string(),
                value: days.to_string(),
                reason: "window must cover at least one day".to_string(),
            });
        }
        let start = end
            .checked_sub_days(Days::new(u64::from(days) - 1))
            .ok_or_else(|| FetcherError::ConfigError {
                message: format!("window of {} days before {} is out of range", days, end),
            })?;
        Self::new(start, end)
    }

    /// Rolling window ending yesterday (UTC); today's imagery is rarely complete.
    pub fn rolling(days: u32) -> Result<Self> {
        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().ok_or_else(|| FetcherError::ConfigError {
            message: "cannot compute yesterday".to_string(),
        })?;
        Self::ending_at(yesterday, days)
    }

    /// Oldest first.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn day_count(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dates_are_inclusive_and_ordered() {
        let window = DateWindow::new(date(2024, 2, 27), date(2024, 3, 2)).unwrap();
        let dates: Vec<NaiveDate> = window.dates().collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 2, 27),
                date(2024, 2, 28),
                date(2024, 2, 29),
                date(2024, 3, 1),
                date(2024, 3, 2)
            ]
        );
        assert_eq!(window.day_count(), 5);
    }

    #[test]
    fn test_ending_at() {
        let window = DateWindow::ending_at(date(2024, 6, 10), 5).unwrap();
        assert_eq!(window.start, date(2024, 6, 6));
        assert_eq!(window.end, date(2024, 6, 10));

        let single = DateWindow::ending_at(date(2024, 6, 10), 1).unwrap();
        assert_eq!(single.dates().count(), 1);

        assert!(DateWindow::ending_at(date(2024, 6, 10), 0).is_err());
    }

    #[test]
    fn test_rejects_reversed_window() {
        assert!(DateWindow::new(date(2024, 6, 10), date(2024, 6, 9)).is_err());
    }

    #[test]
    fn test_rolling_window_ends_yesterday() {
        let window = DateWindow::rolling(3).unwrap();
        assert_eq!(window.end, Utc::now().date_naive().pred_opt().unwrap());
        assert_eq!(window.day_count(), 3);
    }
}
