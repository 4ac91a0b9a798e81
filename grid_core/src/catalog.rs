//! Fixed catalog of the grid tables the dashboard reads.
//! Table names, regions, fuel-source order and date-picker bounds never change at runtime.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NYISO_FUEL_SOURCES: &[&str] = &[
    "dual_fuel",
    "hydro",
    "natural_gas",
    "nuclear",
    "other_fossil_fuels",
    "other_renewables",
    "wind",
];

pub const CAISO_FUEL_SOURCES: &[&str] = &[
    "solar",
    "wind",
    "geothermal",
    "biomass",
    "biogas",
    "small_hydro",
    "coal",
    "nuclear",
    "natural_gas",
    "large_hydro",
    "batteries",
    "imports",
    "other",
];

pub const ISONE_FUEL_SOURCES: &[&str] = &[
    "coal",
    "hydro",
    "landfill_gas",
    "natural_gas",
    "nuclear",
    "oil",
    "refuse",
    "solar",
    "wind",
    "wood",
    "other",
];

const LOAD_COLUMNS: &[&str] = &["load"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    #[error("unknown granularity: {0}")]
    UnknownGranularity(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Nyiso,
    Caiso,
    Isone,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Nyiso, Region::Caiso, Region::Isone];

    /// Lowercase key used in table names and URLs.
    pub fn key(self) -> &'static str {
        match self {
            Region::Nyiso => "nyiso",
            Region::Caiso => "caiso",
            Region::Isone => "isone",
        }
    }

    /// Tab label.
    pub fn label(self) -> &'static str {
        match self {
            Region::Nyiso => "NYISO",
            Region::Caiso => "CAISO",
            Region::Isone => "ISONE",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Region::Nyiso => "New York",
            Region::Caiso => "California",
            Region::Isone => "New England",
        }
    }

    pub fn fuel_sources(self) -> &'static [&'static str] {
        match self {
            Region::Nyiso => NYISO_FUEL_SOURCES,
            Region::Caiso => CAISO_FUEL_SOURCES,
            Region::Isone => ISONE_FUEL_SOURCES,
        }
    }

    pub fn load_table(self) -> GridTable {
        GridTable::new(self, SeriesKind::Load)
    }

    pub fn fuel_mix_table(self) -> GridTable {
        GridTable::new(self, SeriesKind::FuelMix)
    }

    /// Day-of load forecast table (`ds`, `yhat`, `yhat_lower`, `yhat_upper`).
    pub fn forecast_table(self) -> &'static str {
        match self {
            Region::Nyiso => "nyiso_load_forecast",
            Region::Caiso => "caiso_load_forecast",
            Region::Isone => "isone_load_forecast",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Region {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownRegion(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Load,
    FuelMix,
}

impl SeriesKind {
    pub fn key(self) -> &'static str {
        match self {
            SeriesKind::Load => "load",
            SeriesKind::FuelMix => "fuel_mix",
        }
    }
}

/// One of the six `{region}_{load|fuel_mix}` tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GridTable {
    pub region: Region,
    pub kind: SeriesKind,
}

impl GridTable {
    pub const ALL: [GridTable; 6] = [
        GridTable::new(Region::Nyiso, SeriesKind::Load),
        GridTable::new(Region::Nyiso, SeriesKind::FuelMix),
        GridTable::new(Region::Caiso, SeriesKind::Load),
        GridTable::new(Region::Caiso, SeriesKind::FuelMix),
        GridTable::new(Region::Isone, SeriesKind::Load),
        GridTable::new(Region::Isone, SeriesKind::FuelMix),
    ];

    pub const fn new(region: Region, kind: SeriesKind) -> Self {
        Self { region, kind }
    }

    pub fn name(self) -> &'static str {
        match (self.region, self.kind) {
            (Region::Nyiso, SeriesKind::Load) => "nyiso_load",
            (Region::Nyiso, SeriesKind::FuelMix) => "nyiso_fuel_mix",
            (Region::Caiso, SeriesKind::Load) => "caiso_load",
            (Region::Caiso, SeriesKind::FuelMix) => "caiso_fuel_mix",
            (Region::Isone, SeriesKind::Load) => "isone_load",
            (Region::Isone, SeriesKind::FuelMix) => "isone_fuel_mix",
        }
    }

    /// Value columns in display order; load tables have a single `load` column.
    pub fn columns(self) -> &'static [&'static str] {
        match self.kind {
            SeriesKind::Load => LOAD_COLUMNS,
            SeriesKind::FuelMix => self.region.fuel_sources(),
        }
    }

    pub fn is_load(self) -> bool {
        self.kind == SeriesKind::Load
    }

    /// Earliest date the history pickers allow for this table.
    pub fn min_date(self) -> NaiveDate {
        let (y, m, d) = match (self.region, self.kind) {
            (Region::Nyiso, SeriesKind::Load) => (2002, 1, 1),
            (Region::Nyiso, SeriesKind::FuelMix) => (2018, 1, 1),
            (Region::Caiso, SeriesKind::Load) => (2002, 1, 1),
            (Region::Caiso, SeriesKind::FuelMix) => (2019, 1, 1),
            (Region::Isone, SeriesKind::Load) => (2022, 7, 1),
            (Region::Isone, SeriesKind::FuelMix) => (2018, 1, 1),
        };
        ymd(y, m, d)
    }

    pub fn default_start(self) -> NaiveDate {
        match (self.region, self.kind) {
            (Region::Isone, SeriesKind::Load) => ymd(2023, 1, 1),
            _ => ymd(2021, 1, 1),
        }
    }

    /// Clamp a picked date into `[min_date, today]`.
    pub fn clamp_date(self, date: NaiveDate, today: NaiveDate) -> NaiveDate {
        date.max(self.min_date()).min(today)
    }
}

impl fmt::Display for GridTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GridTable {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GridTable::ALL
            .into_iter()
            .find(|t| t.name() == s.trim())
            .ok_or_else(|| CatalogError::UnknownTable(s.to_string()))
    }
}

impl TryFrom<String> for GridTable {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GridTable> for String {
    fn from(table: GridTable) -> Self {
        table.name().to_string()
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_name_round_trips() {
        for table in GridTable::ALL {
            assert_eq!(table.name().parse::<GridTable>().unwrap(), table);
            assert!(table.name().starts_with(table.region.key()));
            assert!(table.name().ends_with(table.kind.key()));
        }
    }

    #[test]
    fn unknown_table_is_rejected() {
        let err = "nyiso_prices".parse::<GridTable>().unwrap_err();
        assert_eq!(err, CatalogError::UnknownTable("nyiso_prices".to_string()));
        assert!("nyiso_load; DROP TABLE x".parse::<GridTable>().is_err());
    }

    #[test]
    fn regions_map_to_display_names() {
        assert_eq!(GridTable::ALL[0].region.display_name(), "New York");
        assert_eq!("CAISO".parse::<Region>().unwrap().display_name(), "California");
        assert_eq!(Region::Isone.display_name(), "New England");
        assert!("ercot".parse::<Region>().is_err());
    }

    #[test]
    fn fuel_columns_keep_fixed_order() {
        let cols = Region::Nyiso.fuel_mix_table().columns();
        assert_eq!(cols.first(), Some(&"dual_fuel"));
        assert_eq!(cols.last(), Some(&"wind"));
        assert_eq!(Region::Caiso.fuel_sources().len(), 13);
        assert_eq!(Region::Isone.fuel_sources().len(), 11);
        assert_eq!(Region::Isone.load_table().columns(), &["load"]);
    }

    #[test]
    fn picker_dates_are_clamped() {
        let table = Region::Isone.load_table();
        let today = ymd(2024, 11, 26);
        assert_eq!(table.min_date(), ymd(2022, 7, 1));
        assert_eq!(table.default_start(), ymd(2023, 1, 1));
        assert_eq!(table.clamp_date(ymd(2020, 1, 1), today), ymd(2022, 7, 1));
        assert_eq!(table.clamp_date(ymd(2030, 1, 1), today), today);
        assert_eq!(table.clamp_date(ymd(2024, 3, 3), today), ymd(2024, 3, 3));
    }

    #[test]
    fn table_serializes_as_its_name() {
        let json = serde_json::to_string(&Region::Caiso.fuel_mix_table()).unwrap();
        assert_eq!(json, "\"caiso_fuel_mix\"");
        let back: GridTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Region::Caiso.fuel_mix_table());
        assert!(serde_json::from_str::<GridTable>("\"bogus\"").is_err());
    }
}
