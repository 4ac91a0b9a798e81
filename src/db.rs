use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use grid_core::{ForecastRow, GridTable, Region, SeriesRow, TimeWindow};
use sqlx::{PgPool, QueryBuilder, Row, postgres::PgPoolOptions};

pub async fn connect_db(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("connecting to DATABASE_URL")?;
    Ok(pool)
}

pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Select the table's value columns for `[start, end)`.
///
/// Identifiers come from the catalog constants, never from the request, so they are
/// pushed verbatim; the window bounds are bound parameters. Values are cast to
/// double precision because some ISO feeds store integer megawatts.
fn series_query(table: GridTable, window: &TimeWindow) -> QueryBuilder<'static, sqlx::Postgres> {
    let columns = table
        .columns()
        .iter()
        .map(|c| format!(r#""{c}"::double precision AS "{c}""#))
        .collect::<Vec<_>>()
        .join(", ");
    let mut builder = QueryBuilder::new(format!(
        r#"SELECT "time", {columns} FROM {} WHERE "time" >= "#,
        table.name()
    ));
    builder.push_bind(window.start);
    if let Some(end) = window.end {
        builder.push(r#" AND "time" < "#).push_bind(end);
    }
    builder.push(r#" ORDER BY "time""#);
    builder
}

pub async fn fetch_series(
    pool: &PgPool,
    table: GridTable,
    window: &TimeWindow,
) -> Result<Vec<SeriesRow>, sqlx::Error> {
    let rows = series_query(table, window).build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| -> Result<SeriesRow, sqlx::Error> {
            let time: NaiveDateTime = row.try_get("time")?;
            let values = table
                .columns()
                .iter()
                .map(|c| row.try_get::<Option<f64>, _>(*c))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SeriesRow::new(time, values))
        })
        .collect()
}

pub async fn fetch_forecast(
    pool: &PgPool,
    region: Region,
    window: &TimeWindow,
) -> Result<Vec<ForecastRow>, sqlx::Error> {
    let mut builder = QueryBuilder::new(format!(
        r#"
        SELECT
            ds,
            yhat::double precision AS yhat,
            yhat_lower::double precision AS yhat_lower,
            yhat_upper::double precision AS yhat_upper
        FROM {}
        WHERE ds >= "#,
        region.forecast_table()
    ));
    builder.push_bind(window.start);
    if let Some(end) = window.end {
        builder.push(" AND ds < ").push_bind(end);
    }
    builder.push(" ORDER BY ds");
    let rows = builder.build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| -> Result<ForecastRow, sqlx::Error> {
            Ok(ForecastRow {
                ds: row.try_get("ds")?,
                yhat: row.try_get("yhat")?,
                yhat_lower: row.try_get("yhat_lower")?,
                yhat_upper: row.try_get("yhat_upper")?,
            })
        })
        .collect()
}
