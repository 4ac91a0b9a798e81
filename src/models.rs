use chrono::{NaiveDate, NaiveDateTime};
use grid_core::{
    ForecastRow, FuelMixProfile, GridTable, LoadProfile, Region, SeriesRow, TimeWindow, midnight,
};
use serde::{Deserialize, Serialize};

use crate::{error::DashboardError, loader::DayView};

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeParams {
    /// Window for `table`; a missing start falls back to the table's default history start,
    /// a missing end leaves the window open.
    pub fn window(&self, table: GridTable) -> Result<TimeWindow, DashboardError> {
        let start = match self.start.as_deref() {
            Some(raw) => parse_instant(raw)?,
            None => midnight(table.default_start()),
        };
        let end = self.end.as_deref().map(parse_instant).transpose()?;
        Ok(TimeWindow::new(start, end)?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub region: Option<String>,
}

impl DashboardParams {
    pub fn region(&self) -> Result<Region, DashboardError> {
        parse_region(self.region.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub region: Option<String>,
    pub load_start: Option<String>,
    pub load_end: Option<String>,
    pub fuel_start: Option<String>,
    pub fuel_end: Option<String>,
}

impl HistoryParams {
    pub fn region(&self) -> Result<Region, DashboardError> {
        parse_region(self.region.as_deref())
    }
}

fn parse_region(raw: Option<&str>) -> Result<Region, DashboardError> {
    match raw.filter(|r| !r.trim().is_empty()) {
        Some(r) => Ok(r.parse()?),
        None => Ok(Region::Nyiso),
    }
}

/// Date-picker value for one history column, clamped into `[min_date, today]`.
pub fn picked_date(
    raw: Option<&str>,
    fallback: NaiveDate,
    table: GridTable,
    today: NaiveDate,
) -> Result<NaiveDate, DashboardError> {
    let date = match raw.filter(|r| !r.trim().is_empty()) {
        Some(r) => parse_date(r)?,
        None => fallback,
    };
    Ok(table.clamp_date(date, today))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, DashboardError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DashboardError::InvalidDate(raw.to_string()))
}

/// `YYYY-MM-DD` (midnight) or a full `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS`.
pub fn parse_instant(raw: &str) -> Result<NaiveDateTime, DashboardError> {
    let s = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(midnight(date));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| DashboardError::InvalidDate(raw.to_string()))
}

#[derive(Debug, Serialize)]
pub struct RowView {
    pub time: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

impl From<&SeriesRow> for RowView {
    fn from(row: &SeriesRow) -> Self {
        Self {
            time: row.time,
            values: row.values.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeriesView {
    pub table: GridTable,
    pub region: Region,
    pub columns: &'static [&'static str],
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub rows: Vec<RowView>,
}

impl SeriesView {
    pub fn new(table: GridTable, window: TimeWindow, rows: &[SeriesRow]) -> Self {
        Self {
            table,
            region: table.region,
            columns: table.columns(),
            start: window.start,
            end: window.end,
            rows: rows.iter().map(RowView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodayView {
    pub table: GridTable,
    pub columns: &'static [&'static str],
    pub requested: TimeWindow,
    pub window: TimeWindow,
    pub fell_back: bool,
    pub rows: Vec<RowView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forecast: Vec<ForecastRow>,
}

impl TodayView {
    pub fn new(day: &DayView, forecast: &[ForecastRow]) -> Self {
        Self {
            table: day.table,
            columns: day.table.columns(),
            requested: day.requested,
            window: day.window,
            fell_back: day.fell_back,
            rows: day.rows.iter().map(RowView::from).collect(),
            forecast: forecast.to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileView {
    Load(LoadProfile),
    FuelMix(FuelMixProfile),
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub db: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn instants_accept_dates_and_datetimes() {
        assert_eq!(parse_instant("2024-01-01").unwrap(), midnight(date(2024, 1, 1)));
        assert_eq!(
            parse_instant("2024-01-01T06:30:00").unwrap(),
            date(2024, 1, 1).and_hms_opt(6, 30, 0).unwrap()
        );
        assert_eq!(
            parse_instant("2024-01-01 06:30:00").unwrap(),
            date(2024, 1, 1).and_hms_opt(6, 30, 0).unwrap()
        );
        assert!(matches!(
            parse_instant("01/02/2024"),
            Err(DashboardError::InvalidDate(_))
        ));
    }

    #[test]
    fn missing_start_uses_table_default() {
        let params = RangeParams::default();
        let window = params.window(Region::Isone.load_table()).unwrap();
        assert_eq!(window.start, midnight(date(2023, 1, 1)));
        assert_eq!(window.end, None);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let params = RangeParams {
            start: Some("2024-02-01".into()),
            end: Some("2024-01-01".into()),
        };
        assert!(matches!(
            params.window(Region::Nyiso.load_table()),
            Err(DashboardError::InvalidWindow(_))
        ));
    }

    #[test]
    fn picked_dates_are_clamped() {
        let today = date(2024, 11, 26);
        let table = Region::Caiso.fuel_mix_table();
        assert_eq!(
            picked_date(Some("2010-05-05"), today, table, today).unwrap(),
            date(2019, 1, 1)
        );
        assert_eq!(
            picked_date(Some("2030-01-01"), today, table, today).unwrap(),
            today
        );
        assert_eq!(picked_date(None, date(2021, 1, 1), table, today).unwrap(), date(2021, 1, 1));
        assert!(picked_date(Some("nope"), today, table, today).is_err());
    }

    #[test]
    fn region_defaults_to_new_york() {
        assert_eq!(DashboardParams::default().region().unwrap(), Region::Nyiso);
        let params = DashboardParams {
            region: Some("CAISO".into()),
        };
        assert_eq!(params.region().unwrap(), Region::Caiso);
        let bad = DashboardParams {
            region: Some("ercot".into()),
        };
        assert!(matches!(bad.region(), Err(DashboardError::Catalog(_))));
    }
}
