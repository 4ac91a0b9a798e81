//! Read-only data sources behind the loader.
//! Postgres when `DATABASE_URL` is configured; otherwise an in-memory store,
//! optionally seeded from a YAML fixture so the dashboard can run without a database.

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use grid_core::{ForecastRow, GridTable, Region, SeriesRow, TimeWindow};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::{config::DashboardConfig, db};

#[derive(Clone)]
pub enum SeriesStore {
    Postgres(PgPool),
    Memory(Arc<MemoryStore>),
}

impl SeriesStore {
    pub async fn from_config(config: &DashboardConfig) -> Result<Self> {
        if let Some(url) = config.database_url.as_deref() {
            if config.seed_path.is_some() {
                warn!("DATABASE_URL is set; ignoring seed fixture");
            }
            let pool = db::connect_db(url).await?;
            info!("serving series from postgres");
            return Ok(SeriesStore::Postgres(pool));
        }
        let store = match config.seed_path.as_deref() {
            Some(path) => MemoryStore::from_yaml_file(path)?,
            None => {
                warn!("DATABASE_URL not set; serving from an empty in-memory store");
                MemoryStore::default()
            }
        };
        info!(rows = store.row_count(), "serving series from memory");
        Ok(SeriesStore::Memory(Arc::new(store)))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            SeriesStore::Postgres(_) => "postgres",
            SeriesStore::Memory(_) => "memory",
        }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        match self {
            SeriesStore::Postgres(pool) => db::ping(pool).await,
            SeriesStore::Memory(_) => Ok(()),
        }
    }

    pub async fn fetch_series(
        &self,
        table: GridTable,
        window: &TimeWindow,
    ) -> Result<Vec<SeriesRow>, sqlx::Error> {
        match self {
            SeriesStore::Postgres(pool) => db::fetch_series(pool, table, window).await,
            SeriesStore::Memory(mem) => Ok(mem.series(table, window)),
        }
    }

    pub async fn fetch_forecast(
        &self,
        region: Region,
        window: &TimeWindow,
    ) -> Result<Vec<ForecastRow>, sqlx::Error> {
        match self {
            SeriesStore::Postgres(pool) => db::fetch_forecast(pool, region, window).await,
            SeriesStore::Memory(mem) => Ok(mem.forecast(region, window)),
        }
    }
}

/// Rows kept as inserted; windowing happens on read, like a range scan.
#[derive(Default)]
pub struct MemoryStore {
    tables: HashMap<GridTable, Vec<SeriesRow>>,
    forecasts: HashMap<Region, Vec<ForecastRow>>,
}

impl MemoryStore {
    pub fn insert_rows(&mut self, table: GridTable, rows: impl IntoIterator<Item = SeriesRow>) {
        self.tables.entry(table).or_default().extend(rows);
    }

    pub fn insert_forecast(
        &mut self,
        region: Region,
        rows: impl IntoIterator<Item = ForecastRow>,
    ) {
        self.forecasts.entry(region).or_default().extend(rows);
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    fn series(&self, table: GridTable, window: &TimeWindow) -> Vec<SeriesRow> {
        self.tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| window.contains(r.time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn forecast(&self, region: Region, window: &TimeWindow) -> Vec<ForecastRow> {
        self.forecasts
            .get(&region)
            .map(|rows| {
                rows.iter()
                    .filter(|r| window.contains(r.ds))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed fixture {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }

    /// Parse a fixture of the form:
    ///
    /// ```yaml
    /// series:
    ///   - table: nyiso_load
    ///     rows:
    ///       - { time: "2024-11-26T00:00:00", load: 15210.5 }
    /// forecasts:
    ///   - region: nyiso
    ///     rows:
    ///       - { ds: "2024-11-26T00:00:00", yhat: 15000, yhat_lower: 14200, yhat_upper: 15800 }
    /// ```
    ///
    /// Row keys other than `time` are matched against the table's columns; unknown keys are ignored.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let fixture: SeedFixture = serde_yaml::from_str(raw).context("parsing seed fixture yaml")?;
        let mut store = MemoryStore::default();
        for block in fixture.series {
            let columns = block.table.columns();
            let rows = block.rows.into_iter().map(|row| {
                let values = columns
                    .iter()
                    .map(|c| row.columns.get(*c).copied().flatten())
                    .collect();
                SeriesRow::new(row.time, values)
            });
            store.insert_rows(block.table, rows);
        }
        for block in fixture.forecasts {
            store.insert_forecast(block.region, block.rows);
        }
        Ok(store)
    }
}

#[derive(Deserialize)]
struct SeedFixture {
    #[serde(default)]
    series: Vec<SeedSeries>,
    #[serde(default)]
    forecasts: Vec<SeedForecast>,
}

#[derive(Deserialize)]
struct SeedSeries {
    table: GridTable,
    rows: Vec<SeedRow>,
}

#[derive(Deserialize)]
struct SeedRow {
    time: NaiveDateTime,
    #[serde(flatten)]
    columns: HashMap<String, Option<f64>>,
}

#[derive(Deserialize)]
struct SeedForecast {
    region: Region,
    rows: Vec<ForecastRow>,
}
