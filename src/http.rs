use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use grid_core::{
    CatalogError, ForecastRow, Granularity, GridTable, Region, SeriesRow, TimeWindow, fuel_mix_profile,
    load_profile,
};

use crate::{
    AppState,
    chart::Chart,
    error::DashboardError,
    loader::DayView,
    models::{
        DashboardParams, HealthResponse, HistoryParams, ProfileView, RangeParams, SeriesView,
        TodayView, picked_date,
    },
    pages::{HistoryColumn, HistoryPage, RealtimePanel, realtime_page},
    store::SeriesStore,
    views,
};

fn parse_table(raw: &str) -> Result<GridTable, DashboardError> {
    Ok(raw.parse::<GridTable>()?)
}

fn profile_view(table: GridTable, granularity: Granularity, rows: &[SeriesRow]) -> ProfileView {
    if table.is_load() {
        ProfileView::Load(load_profile(rows, granularity))
    } else {
        ProfileView::FuelMix(fuel_mix_profile(rows, table.columns(), granularity))
    }
}

fn profile_chart(table: GridTable, granularity: Granularity, rows: &[SeriesRow]) -> Chart {
    match profile_view(table, granularity, rows) {
        ProfileView::Load(p) => views::load_profile_chart(table.region, &p),
        ProfileView::FuelMix(p) => views::fuel_profile_chart(table.region, &p),
    }
}

/// Forecast rows for the load overlay; a failed lookup yields none.
fn forecast_overlay(
    region: Region,
    result: Result<Arc<Vec<ForecastRow>>, DashboardError>,
) -> Arc<Vec<ForecastRow>> {
    result.unwrap_or_else(|err| {
        tracing::warn!(region = %region, error = %err, "forecast unavailable; drawing load only");
        Arc::default()
    })
}

/// Realtime chart for a table, with the forecast overlay on load tables.
async fn today_chart(state: &AppState, day: &DayView) -> Chart {
    if day.table.is_load() {
        let region = day.table.region;
        let forecast = forecast_overlay(
            region,
            state.loader.load_forecast(region, day.window).await,
        );
        views::realtime_load_chart(day, &forecast)
    } else {
        views::realtime_fuel_chart(day)
    }
}

fn svg_response(svg: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        svg,
    )
        .into_response()
}

pub(crate) async fn realtime_home(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Html<String>, DashboardError> {
    let region = params.region()?;
    let today = state.today();

    let mut panels = Vec::with_capacity(2);
    for (heading, table) in [
        ("Load", region.load_table()),
        ("Fuel Mix", region.fuel_mix_table()),
    ] {
        let day = state.loader.load_today(table, today).await?;
        let chart = today_chart(&state, &day).await;
        panels.push(RealtimePanel {
            heading: heading.to_string(),
            svg: chart.render_svg(),
            fallback_from: day
                .fell_back
                .then(|| (day.requested.start_date(), day.window.start_date())),
        });
    }

    Ok(Html(realtime_page(region, state.config.refresh_secs, &panels)))
}

async fn history_column(
    state: &AppState,
    heading: &str,
    table: GridTable,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<HistoryColumn, DashboardError> {
    let today = state.today();
    let start = picked_date(start, table.default_start(), table, today)?;
    let end = picked_date(end, today, table, today)?;
    // Clamped pickers can leave `end <= start`: render the column empty.
    let rows = match TimeWindow::between_dates(start, Some(end)) {
        Ok(window) => state.loader.load_window(table, window).await?,
        Err(err) => {
            tracing::debug!(table = %table, error = %err, "empty history range");
            Arc::default()
        }
    };

    let svgs = Granularity::ALL
        .into_iter()
        .map(|g| profile_chart(table, g, &rows).render_svg())
        .collect();
    Ok(HistoryColumn {
        heading: heading.to_string(),
        start,
        end,
        min: table.min_date(),
        max: today,
        svgs,
    })
}

pub(crate) async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Html<String>, DashboardError> {
    let region = params.region()?;
    let load = history_column(
        &state,
        "Load",
        region.load_table(),
        params.load_start.as_deref(),
        params.load_end.as_deref(),
    )
    .await?;
    let fuel = history_column(
        &state,
        "Fuel Mix",
        region.fuel_mix_table(),
        params.fuel_start.as_deref(),
        params.fuel_end.as_deref(),
    )
    .await?;
    Ok(Html(HistoryPage { region, load, fuel }.render()))
}

/// `/charts/{table}/today.svg` or `/charts/{table}/{granularity}.svg`.
pub(crate) async fn chart_svg(
    State(state): State<AppState>,
    Path((table, view)): Path<(String, String)>,
    Query(range): Query<RangeParams>,
) -> Result<Response, DashboardError> {
    let table = parse_table(&table)?;
    let view = view
        .strip_suffix(".svg")
        .ok_or_else(|| CatalogError::UnknownGranularity(view.clone()))?;

    if view == "today" {
        let day = state.loader.load_today(table, state.today()).await?;
        let chart = today_chart(&state, &day).await;
        return Ok(svg_response(chart.render_svg()));
    }

    let granularity: Granularity = view.parse()?;
    let window = range.window(table)?;
    let rows = state.loader.load_window(table, window).await?;
    Ok(svg_response(
        profile_chart(table, granularity, &rows).render_svg(),
    ))
}

pub(crate) async fn api_series(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(range): Query<RangeParams>,
) -> Result<Json<SeriesView>, DashboardError> {
    let table = parse_table(&table)?;
    let window = range.window(table)?;
    let rows = state.loader.load_window(table, window).await?;
    Ok(Json(SeriesView::new(table, window, &rows)))
}

pub(crate) async fn api_today(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<TodayView>, DashboardError> {
    let table = parse_table(&table)?;
    let day = state.loader.load_today(table, state.today()).await?;
    let forecast = if table.is_load() {
        state.loader.load_forecast(table.region, day.window).await?
    } else {
        Default::default()
    };
    Ok(Json(TodayView::new(&day, &forecast)))
}

pub(crate) async fn api_profile(
    State(state): State<AppState>,
    Path((table, granularity)): Path<(String, String)>,
    Query(range): Query<RangeParams>,
) -> Result<Json<ProfileView>, DashboardError> {
    let table = parse_table(&table)?;
    let granularity: Granularity = granularity.parse()?;
    let window = range.window(table)?;
    let rows = state.loader.load_window(table, window).await?;
    Ok(Json(profile_view(table, granularity, &rows)))
}

/// The catalog: regions, their tables, columns and history date bounds.
pub(crate) async fn list_regions() -> Json<Vec<serde_json::Value>> {
    let regions = Region::ALL
        .iter()
        .map(|region| {
            let tables: Vec<serde_json::Value> = [region.load_table(), region.fuel_mix_table()]
                .into_iter()
                .map(|table| {
                    serde_json::json!({
                        "table": table.name(),
                        "columns": table.columns(),
                        "min_date": table.min_date(),
                        "default_start": table.default_start(),
                    })
                })
                .collect();
            serde_json::json!({
                "region": region.key(),
                "name": region.display_name(),
                "tables": tables,
            })
        })
        .collect();
    Json(regions)
}

pub(crate) async fn health(State(state): State<AppState>) -> Response {
    let store = state.loader.store();
    let db = match store {
        SeriesStore::Postgres(_) => "ok",
        SeriesStore::Memory(_) => "disabled",
    };
    match store.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok".to_string(),
            store: store.backend().to_string(),
            db: db.to_string(),
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "health db check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    store: store.backend().to_string(),
                    db: "error".to_string(),
                }),
            )
                .into_response()
        }
    }
}
