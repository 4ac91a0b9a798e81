//! Windowed series loader: range query, chronological sort, "today" fallback, TTL cache.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use grid_core::{ForecastRow, GridTable, Region, SeriesRow, TimeWindow, previous_day};
use tracing::{debug, info};

use crate::{cache::TtlCache, error::DashboardError, store::SeriesStore};

/// Windows kept per cache. Request-supplied bounds make the key space open-ended.
const CACHE_CAPACITY: usize = 512;

/// Rows for the realtime views. `window` is the window actually displayed,
/// which differs from `requested` when the fallback to yesterday fired.
#[derive(Clone, Debug)]
pub struct DayView {
    pub table: GridTable,
    pub requested: TimeWindow,
    pub window: TimeWindow,
    pub fell_back: bool,
    pub rows: Arc<Vec<SeriesRow>>,
}

pub struct SeriesLoader {
    store: SeriesStore,
    series_cache: TtlCache<(GridTable, TimeWindow), Arc<Vec<SeriesRow>>>,
    forecast_cache: TtlCache<(Region, TimeWindow), Arc<Vec<ForecastRow>>>,
    forecast_enabled: bool,
}

impl SeriesLoader {
    pub fn new(store: SeriesStore, ttl: Duration, forecast_enabled: bool) -> Self {
        Self {
            store,
            series_cache: TtlCache::new(ttl, CACHE_CAPACITY),
            forecast_cache: TtlCache::new(ttl, CACHE_CAPACITY),
            forecast_enabled,
        }
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    /// All rows with `start <= time < end` (or `start <= time` when open-ended), ascending.
    pub async fn load_window(
        &self,
        table: GridTable,
        window: TimeWindow,
    ) -> Result<Arc<Vec<SeriesRow>>, DashboardError> {
        let key = (table, window);
        if let Some(rows) = self.series_cache.get(&key).await {
            debug!(table = %table, start = %window.start, "series cache hit");
            return Ok(rows);
        }

        let mut rows = self
            .store
            .fetch_series(table, &window)
            .await
            .inspect_err(|err| tracing::error!(table = %table, error = %err, "series query failed"))?;
        rows.retain(|r| window.contains(r.time));
        rows.sort_by_key(|r| r.time);

        let rows = Arc::new(rows);
        self.series_cache.insert(key, rows.clone()).await;
        Ok(rows)
    }

    /// Load `[today, tomorrow)`; if that is empty, load `[yesterday, today)` once.
    /// A still-empty fallback is returned as-is.
    pub async fn load_today(
        &self,
        table: GridTable,
        today: NaiveDate,
    ) -> Result<DayView, DashboardError> {
        let requested = TimeWindow::day(today);
        let rows = self.load_window(table, requested).await?;
        if !rows.is_empty() {
            return Ok(DayView {
                table,
                requested,
                window: requested,
                fell_back: false,
                rows,
            });
        }

        let window = TimeWindow::day(previous_day(today));
        info!(table = %table, %today, "no rows for today; falling back to yesterday");
        let rows = self.load_window(table, window).await?;
        Ok(DayView {
            table,
            requested,
            window,
            fell_back: true,
            rows,
        })
    }

    /// Forecast rows for the window, or nothing when forecasts are switched off.
    pub async fn load_forecast(
        &self,
        region: Region,
        window: TimeWindow,
    ) -> Result<Arc<Vec<ForecastRow>>, DashboardError> {
        if !self.forecast_enabled {
            return Ok(Arc::new(Vec::new()));
        }
        let key = (region, window);
        if let Some(rows) = self.forecast_cache.get(&key).await {
            return Ok(rows);
        }
        let mut rows = self
            .store
            .fetch_forecast(region, &window)
            .await
            .inspect_err(|err| tracing::error!(region = %region, error = %err, "forecast query failed"))?;
        rows.retain(|r| window.contains(r.ds));
        rows.sort_by_key(|r| r.ds);

        let rows = Arc::new(rows);
        self.forecast_cache.insert(key, rows.clone()).await;
        Ok(rows)
    }

    pub async fn purge_expired(&self) -> usize {
        let now = std::time::Instant::now();
        self.series_cache.purge_expired(now).await + self.forecast_cache.purge_expired(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDateTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn load_rows(times: &[NaiveDateTime]) -> Vec<SeriesRow> {
        times
            .iter()
            .enumerate()
            .map(|(i, t)| SeriesRow::new(*t, vec![Some(1000.0 + i as f64)]))
            .collect()
    }

    fn loader_with(mem: MemoryStore) -> SeriesLoader {
        SeriesLoader::new(
            SeriesStore::Memory(Arc::new(mem)),
            Duration::from_secs(600),
            true,
        )
    }

    #[tokio::test]
    async fn january_window_is_bounded_and_sorted() {
        let table = Region::Nyiso.load_table();
        let mut mem = MemoryStore::default();
        // Deliberately out of order, with rows on both edges of the window.
        mem.insert_rows(
            table,
            load_rows(&[
                at(2024, 1, 20, 8, 0),
                at(2024, 2, 1, 0, 0),
                at(2024, 1, 1, 0, 0),
                at(2023, 12, 31, 23, 55),
                at(2024, 1, 31, 23, 55),
                at(2024, 1, 5, 12, 30),
            ]),
        );
        let loader = loader_with(mem);

        let window = TimeWindow::between_dates(date(2024, 1, 1), Some(date(2024, 2, 1))).unwrap();
        let rows = loader.load_window(table, window).await.unwrap();

        let times: Vec<_> = rows.iter().map(|r| r.time).collect();
        assert_eq!(
            times,
            vec![
                at(2024, 1, 1, 0, 0),
                at(2024, 1, 5, 12, 30),
                at(2024, 1, 20, 8, 0),
                at(2024, 1, 31, 23, 55),
            ]
        );
        assert!(rows.iter().all(|r| window.contains(r.time)));
    }

    #[tokio::test]
    async fn open_ended_window_returns_everything_after_start() {
        let table = Region::Caiso.load_table();
        let mut mem = MemoryStore::default();
        mem.insert_rows(
            table,
            load_rows(&[at(2025, 6, 1, 0, 0), at(2020, 1, 1, 0, 0), at(2021, 1, 1, 0, 0)]),
        );
        let loader = loader_with(mem);

        let window = TimeWindow::between_dates(date(2021, 1, 1), None).unwrap();
        let rows = loader.load_window(table, window).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time, at(2021, 1, 1, 0, 0));
        assert_eq!(rows[1].time, at(2025, 6, 1, 0, 0));
    }

    #[tokio::test]
    async fn today_with_rows_does_not_fall_back() {
        let table = Region::Isone.load_table();
        let mut mem = MemoryStore::default();
        mem.insert_rows(table, load_rows(&[at(2024, 11, 26, 0, 5), at(2024, 11, 25, 23, 0)]));
        let loader = loader_with(mem);

        let view = loader.load_today(table, date(2024, 11, 26)).await.unwrap();
        assert!(!view.fell_back);
        assert_eq!(view.window, TimeWindow::day(date(2024, 11, 26)));
        assert_eq!(view.rows.len(), 1);
    }

    #[tokio::test]
    async fn empty_today_falls_back_to_yesterday() {
        let table = Region::Nyiso.fuel_mix_table();
        let mut mem = MemoryStore::default();
        mem.insert_rows(
            table,
            vec![
                SeriesRow::new(at(2024, 11, 25, 10, 0), vec![Some(1.0); 7]),
                SeriesRow::new(at(2024, 11, 24, 10, 0), vec![Some(1.0); 7]),
            ],
        );
        let loader = loader_with(mem);

        let view = loader.load_today(table, date(2024, 11, 26)).await.unwrap();
        assert!(view.fell_back);
        assert_eq!(view.requested, TimeWindow::day(date(2024, 11, 26)));
        assert_eq!(
            view.window,
            TimeWindow::between_dates(date(2024, 11, 25), Some(date(2024, 11, 26))).unwrap()
        );
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].time, at(2024, 11, 25, 10, 0));
    }

    #[tokio::test]
    async fn still_empty_fallback_passes_through() {
        let loader = loader_with(MemoryStore::default());
        let view = loader
            .load_today(Region::Caiso.fuel_mix_table(), date(2024, 1, 1))
            .await
            .unwrap();
        assert!(view.fell_back);
        assert!(view.rows.is_empty());
        assert_eq!(view.window, TimeWindow::day(date(2023, 12, 31)));
    }

    #[tokio::test]
    async fn repeated_window_is_served_from_cache() {
        let table = Region::Nyiso.load_table();
        let mut mem = MemoryStore::default();
        mem.insert_rows(table, load_rows(&[at(2024, 1, 2, 0, 0)]));
        let loader = loader_with(mem);
        let window = TimeWindow::day(date(2024, 1, 2));

        let first = loader.load_window(table, window).await.unwrap();
        let second = loader.load_window(table, window).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn forecasts_can_be_disabled() {
        let mut mem = MemoryStore::default();
        mem.insert_forecast(
            Region::Nyiso,
            vec![ForecastRow {
                ds: at(2024, 11, 26, 1, 0),
                yhat: 15000.0,
                yhat_lower: 14000.0,
                yhat_upper: 16000.0,
            }],
        );
        let mem = Arc::new(mem);
        let window = TimeWindow::day(date(2024, 11, 26));

        let on = SeriesLoader::new(SeriesStore::Memory(mem.clone()), Duration::ZERO, true);
        assert_eq!(on.load_forecast(Region::Nyiso, window).await.unwrap().len(), 1);

        let off = SeriesLoader::new(SeriesStore::Memory(mem), Duration::ZERO, false);
        assert!(off.load_forecast(Region::Nyiso, window).await.unwrap().is_empty());
    }
}
