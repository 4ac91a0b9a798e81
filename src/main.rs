//! Grid dashboard service.
//! - Reads load, fuel-mix and forecast series for NYISO, CAISO and ISONE from Postgres
//!   (or an in-memory store seeded from YAML when `DATABASE_URL` is unset).
//! - Realtime page: today's load and fuel mix per region, falling back to yesterday when
//!   today has no rows yet, auto-refreshing every `refresh_secs`.
//! - History page: monthly, weekday and hourly averages over picked date ranges.
//! - JSON API and standalone SVG chart endpoints for the same views.
//! - Env vars: DASHBOARD_CONFIG, DASHBOARD_HTTP_ADDR, DATABASE_URL, DASHBOARD_CACHE_TTL_SECS,
//!   DASHBOARD_REFRESH_SECS, DASHBOARD_TODAY, DASHBOARD_FORECAST, DASHBOARD_SEED_PATH.

mod cache;
mod chart;
mod config;
mod db;
mod error;
mod http;
mod loader;
mod models;
mod pages;
mod store;
mod views;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use chrono::NaiveDate;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::DashboardConfig, loader::SeriesLoader, store::SeriesStore};

#[derive(Clone)]
pub(crate) struct AppState {
    loader: Arc<SeriesLoader>,
    config: Arc<DashboardConfig>,
}

impl AppState {
    fn new(loader: SeriesLoader, config: DashboardConfig) -> Self {
        Self {
            loader: Arc::new(loader),
            config: Arc::new(config),
        }
    }

    fn today(&self) -> NaiveDate {
        self.config.today()
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::realtime_home))
        .route("/history", get(http::history))
        .route("/health", get(http::health))
        .route("/charts/{table}/{view}", get(http::chart_svg))
        .route("/api/regions", get(http::list_regions))
        .route("/api/series/{table}", get(http::api_series))
        .route("/api/today/{table}", get(http::api_today))
        .route("/api/profile/{table}/{granularity}", get(http::api_profile))
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &axum::http::Request<_>| {
                        tracing::info_span!(
                            "http_request",
                            method = %req.method(),
                            path = %req.uri().path(),
                            query = ?req.uri().query(),
                            status = tracing::field::Empty,
                        )
                    })
                    .on_response(
                        |res: &axum::http::Response<_>,
                         latency: std::time::Duration,
                         span: &tracing::Span| {
                            span.record("status", tracing::field::display(res.status()));
                            tracing::info!(
                                parent: span,
                                status = %res.status(),
                                latency_ms = %latency.as_millis(),
                                "response sent"
                            );
                        },
                    )
                    .on_failure(
                        |error: tower_http::classify::ServerErrorsFailureClass,
                         latency: std::time::Duration,
                         span: &tracing::Span| {
                            tracing::error!(
                                parent: span,
                                error = %error,
                                latency_ms = %latency.as_millis(),
                                "request failed"
                            );
                        },
                    ),
            ),
        )
}

/// Drop expired cache entries so windows nobody asks for again don't pile up.
fn spawn_cache_purge(loader: Arc<SeriesLoader>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let purged = loader.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "purged expired cache entries");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DashboardConfig::load()?;
    let http_addr: SocketAddr = config
        .http_addr
        .parse()
        .with_context(|| format!("invalid DASHBOARD_HTTP_ADDR {}", config.http_addr))?;

    let store = SeriesStore::from_config(&config).await?;
    let loader = SeriesLoader::new(store, config.cache_ttl(), config.forecast);
    let state = AppState::new(loader, config);
    if !state.config.cache_ttl().is_zero() {
        spawn_cache_purge(state.loader.clone(), state.config.cache_ttl());
    }

    tracing::info!(
        today = %state.today(),
        ttl_secs = state.config.cache_ttl_secs,
        refresh_secs = state.config.refresh_secs,
        forecast = state.config.forecast,
        "Grid dashboard on http://{}",
        http_addr
    );
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding {http_addr}"))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use grid_core::{ForecastRow, Region, SeriesRow};
    use tower::ServiceExt;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_state() -> AppState {
        let at = |y, m, d, h| date(y, m, d).and_hms_opt(h, 0, 0).unwrap();
        let mut mem = MemoryStore::default();
        // Nothing for "today" (2024-11-26) yet: realtime views must fall back.
        mem.insert_rows(
            Region::Nyiso.load_table(),
            vec![
                SeriesRow::new(at(2024, 11, 25, 12), vec![Some(16000.0)]),
                SeriesRow::new(at(2024, 1, 15, 8), vec![Some(18000.0)]),
                SeriesRow::new(at(2024, 1, 2, 8), vec![Some(17000.0)]),
                SeriesRow::new(at(2024, 2, 1, 0), vec![Some(15000.0)]),
            ],
        );
        let sources = Region::Nyiso.fuel_sources().len();
        mem.insert_rows(
            Region::Nyiso.fuel_mix_table(),
            vec![SeriesRow::new(at(2024, 11, 26, 3), vec![Some(100.0); sources])],
        );
        mem.insert_forecast(
            Region::Nyiso,
            vec![ForecastRow {
                ds: at(2024, 11, 25, 13),
                yhat: 16100.0,
                yhat_lower: 15500.0,
                yhat_upper: 16700.0,
            }],
        );
        let config = DashboardConfig {
            today: Some(date(2024, 11, 26)),
            ..DashboardConfig::default()
        };
        let loader = SeriesLoader::new(
            SeriesStore::Memory(Arc::new(mem)),
            config.cache_ttl(),
            config.forecast,
        );
        AppState::new(loader, config)
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        let res = router(test_state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_reports_memory_store() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["store"], "memory");
        assert_eq!(json["db"], "disabled");
    }

    #[tokio::test]
    async fn series_endpoint_returns_january_in_order() {
        let (status, body) = get("/api/series/nyiso_load?start=2024-01-01&end=2024-02-01").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["time"], "2024-01-02T08:00:00");
        assert_eq!(rows[1]["time"], "2024-01-15T08:00:00");
        assert_eq!(json["columns"][0], "load");
        assert_eq!(json["table"], "nyiso_load");
    }

    #[tokio::test]
    async fn unknown_table_is_not_found() {
        let (status, _) = get("/api/series/ercot_load").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get("/charts/nyiso_load/yearly.svg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_dates_are_bad_requests() {
        let (status, _) = get("/api/series/nyiso_load?start=01-01-2024").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get("/api/series/nyiso_load?start=2024-02-01&end=2024-01-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn today_endpoint_reports_fallback_and_forecast() {
        let (status, body) = get("/api/today/nyiso_load").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["fell_back"], true);
        assert_eq!(json["window"]["start"], "2024-11-25T00:00:00");
        assert_eq!(json["window"]["end"], "2024-11-26T00:00:00");
        assert_eq!(json["rows"].as_array().unwrap().len(), 1);
        assert_eq!(json["forecast"].as_array().unwrap().len(), 1);

        let (_, body) = get("/api/today/nyiso_fuel_mix").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["fell_back"], false);
    }

    #[tokio::test]
    async fn profile_endpoint_tags_kind() {
        let (status, body) =
            get("/api/profile/nyiso_load/monthly?start=2024-01-01&end=2024-12-01").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["kind"], "load");
        assert_eq!(json["overall"][0], 17500.0);
        assert_eq!(json["overall"][1], 15000.0);
        assert!(json["overall"][2].is_null());
    }

    #[tokio::test]
    async fn chart_endpoints_serve_svg() {
        let (status, body) = get("/charts/nyiso_fuel_mix/today.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<svg"));
        assert!(body.contains("Realtime New York Fuel Mix"));

        let (status, body) = get("/charts/nyiso_load/weekly.svg?start=2024-01-01").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Historical New York Load Data - Daily Averages by Weekday"));
    }

    #[tokio::test]
    async fn pages_render_with_tabs() {
        let (status, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Realtime New York Load Data"));
        assert!(body.contains("No data yet for 2024-11-26; showing 2024-11-25."));
        assert!(body.contains(r#"http-equiv="refresh" content="300""#));

        let (status, body) = get("/history?region=caiso").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Historical California Fuel Mix - Hourly Averages"));
        assert!(body.contains(r#"name="fuel_start" value="2021-01-01" min="2019-01-01""#));

        let (status, _) = get("/?region=ercot").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn future_history_start_renders_an_empty_column() {
        // Clamped to today, which is also the default end.
        let (status, body) = get("/history?region=nyiso&load_start=2030-01-01").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"name="load_start" value="2024-11-26""#));
        assert!(body.contains("No data"));
        assert!(body.contains("Historical New York Fuel Mix - Monthly Averages"));
    }

    #[tokio::test]
    async fn same_history_start_and_end_renders() {
        let (status, body) =
            get("/history?region=nyiso&load_start=2024-03-01&load_end=2024-03-01").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"name="load_end" value="2024-03-01""#));
        assert!(body.contains("Historical New York Load Data - Hourly Averages"));

        let (status, _) =
            get("/api/series/nyiso_load?start=2024-03-01&end=2024-03-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
