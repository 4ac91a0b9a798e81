//! Shared grid-series types: the fixed table catalog, query windows and calendar aggregation.
//! Keep this crate free of HTTP/SQL deps so the loader, the charts and the tests can all reuse it.

pub mod aggregate;
pub mod catalog;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use aggregate::{
    FuelMixProfile, Granularity, LoadProfile, YearLine, clip_fuel, fuel_mix_profile, load_profile,
    stack,
};
pub use catalog::{CatalogError, GridTable, Region, SeriesKind};

/// One row of a load or fuel-mix table. `values` lines up with `GridTable::columns()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub time: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

impl SeriesRow {
    pub fn new(time: NaiveDateTime, values: Vec<Option<f64>>) -> Self {
        Self { time, values }
    }

    /// Value of the column at `idx`; NULLs and short rows both read as `None`.
    pub fn value(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied().flatten()
    }
}

/// Day-of load forecast: point estimate plus interval bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub ds: NaiveDateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("window end {end} is not after start {start}")]
pub struct WindowError {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Half-open query window `[start, end)`. `end = None` leaves the window open-ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Result<Self, WindowError> {
        if let Some(end) = end {
            if end <= start {
                return Err(WindowError { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn between_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self, WindowError> {
        Self::new(midnight(start), end.map(midnight))
    }

    /// The whole calendar day `[date, date + 1)`.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: midnight(date),
            end: Some(midnight(next_day(date))),
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && self.end.is_none_or(|end| t < end)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }
}

pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_window_is_half_open() {
        let window = TimeWindow::day(date(2024, 11, 26));
        assert!(window.contains(midnight(date(2024, 11, 26))));
        assert!(window.contains(date(2024, 11, 26).and_hms_opt(23, 59, 59).unwrap()));
        assert!(!window.contains(midnight(date(2024, 11, 27))));
        assert!(!window.contains(date(2024, 11, 25).and_hms_opt(23, 59, 59).unwrap()));
    }

    #[test]
    fn open_ended_window_has_no_upper_bound() {
        let window = TimeWindow::between_dates(date(2021, 1, 1), None).unwrap();
        assert!(window.contains(midnight(date(2099, 1, 1))));
        assert!(!window.contains(midnight(date(2020, 12, 31))));
    }

    #[test]
    fn window_end_must_follow_start() {
        let err = TimeWindow::between_dates(date(2024, 2, 1), Some(date(2024, 2, 1))).unwrap_err();
        assert_eq!(err.start, midnight(date(2024, 2, 1)));
        assert!(TimeWindow::between_dates(date(2024, 2, 1), Some(date(2024, 1, 1))).is_err());
    }

    #[test]
    fn day_window_crosses_month_and_year_boundaries() {
        let window = TimeWindow::day(date(2023, 12, 31));
        assert_eq!(window.end, Some(midnight(date(2024, 1, 1))));
        assert_eq!(previous_day(date(2024, 3, 1)), date(2024, 2, 29));
    }

    #[test]
    fn missing_values_read_as_none() {
        let row = SeriesRow::new(midnight(date(2024, 1, 1)), vec![Some(1.0), None]);
        assert_eq!(row.value(0), Some(1.0));
        assert_eq!(row.value(1), None);
        assert_eq!(row.value(5), None);
    }
}
