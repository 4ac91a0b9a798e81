//! Server-rendered HTML. No frontend toolchain: charts are inline SVG from `views`.

use chrono::NaiveDate;
use grid_core::Region;

use crate::chart::escape;

const STYLE: &str = r#"
    body { font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, Helvetica, Arial; margin: 16px; }
    h1 { margin: 0 0 6px 0; }
    .sub { color: #555; margin: 0 0 16px 0; }
    nav a { margin-right: 12px; }
    .tabs { display: flex; gap: 4px; border-bottom: 1px solid #ddd; margin: 12px 0; }
    .tabs a { padding: 6px 14px; border: 1px solid #ddd; border-bottom: none; border-radius: 8px 8px 0 0; text-decoration: none; color: #333; }
    .tabs a.active { background: #eef4ff; font-weight: 600; }
    .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 12px; }
    .card { border: 1px solid #ddd; border-radius: 10px; padding: 12px; }
    .card h2 { font-size: 16px; margin: 0 0 10px 0; }
    .notice { background: #fff6e5; border: 1px solid #f1d9a9; border-radius: 8px; padding: 6px 10px; margin: 8px 0; }
    .row { display: flex; gap: 8px; flex-wrap: wrap; align-items: center; margin-bottom: 8px; }
    input, button { font-size: 13px; padding: 6px 8px; }
    svg.chart { width: 100%; height: auto; }
    .muted { color: #666; font-size: 12px; }
"#;

fn layout(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  {head_extra}
  <title>{title}</title>
  <style>{STYLE}</style>
</head>
<body>
  <nav><a href="/">Realtime</a><a href="/history">Historical Analysis</a><a href="/health">/health</a></nav>
{body}
</body>
</html>
"#,
        title = escape(title)
    )
}

fn region_tabs(path: &str, active: Region) -> String {
    let links: String = Region::ALL
        .iter()
        .map(|r| {
            let class = if *r == active { r#" class="active""# } else { "" };
            format!(r#"<a href="{path}?region={}"{class}>{}</a>"#, r.key(), r.label())
        })
        .collect();
    format!(r#"<div class="tabs">{links}</div>"#)
}

/// One realtime panel: the chart plus a notice when yesterday is shown instead of today.
pub struct RealtimePanel {
    pub heading: String,
    pub svg: String,
    pub fallback_from: Option<(NaiveDate, NaiveDate)>,
}

fn panel_html(panel: &RealtimePanel) -> String {
    let notice = panel
        .fallback_from
        .map(|(requested, shown)| {
            format!(
                r#"<div class="notice">No data yet for {requested}; showing {shown}.</div>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<div class="card"><h2>{}</h2>{notice}{}</div>"#,
        escape(&panel.heading),
        panel.svg
    )
}

pub fn realtime_page(region: Region, refresh_secs: u64, panels: &[RealtimePanel]) -> String {
    let refresh = if refresh_secs > 0 {
        format!(r#"<meta http-equiv="refresh" content="{refresh_secs}" />"#)
    } else {
        String::new()
    };
    let body = format!(
        r#"  <h1>Realtime Grid Dashboard</h1>
  <p class="sub">Today's load and generation by fuel source. Refreshes every {refresh_secs}s.</p>
  {tabs}
  {panels}
"#,
        tabs = region_tabs("/", region),
        panels = panels.iter().map(panel_html).collect::<String>()
    );
    layout(
        &format!("Realtime {} Grid Data", region.label()),
        &refresh,
        &body,
    )
}

/// State of one history column (load or fuel mix): picked range, picker bounds and charts.
pub struct HistoryColumn {
    pub heading: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub min: NaiveDate,
    pub max: NaiveDate,
    pub svgs: Vec<String>,
}

pub struct HistoryPage {
    pub region: Region,
    pub load: HistoryColumn,
    pub fuel: HistoryColumn,
}

fn date_input(name: &str, value: NaiveDate, min: NaiveDate, max: NaiveDate) -> String {
    format!(r#"<input type="date" name="{name}" value="{value}" min="{min}" max="{max}" />"#)
}

fn hidden(name: &str, value: NaiveDate) -> String {
    format!(r#"<input type="hidden" name="{name}" value="{value}" />"#)
}

impl HistoryPage {
    /// Each column's form resubmits the other column's range so both stay put.
    fn column_html(&self, column: &HistoryColumn, prefix: &str, other: (&str, &HistoryColumn)) -> String {
        let (other_prefix, other_col) = other;
        let charts: String = column
            .svgs
            .iter()
            .map(|svg| format!(r#"<div class="chart-wrap">{svg}</div>"#))
            .collect();
        format!(
            r#"<div class="card">
    <h2>{heading}</h2>
    <form method="get" action="/history" class="row">
      <input type="hidden" name="region" value="{region}" />
      {other_start}{other_end}
      <label>Start {start}</label>
      <label>End {end}</label>
      <button type="submit">Update</button>
    </form>
    <div class="muted">Data available from {min}.</div>
    {charts}
  </div>"#,
            heading = escape(&column.heading),
            region = self.region.key(),
            other_start = hidden(&format!("{other_prefix}_start"), other_col.start),
            other_end = hidden(&format!("{other_prefix}_end"), other_col.end),
            start = date_input(&format!("{prefix}_start"), column.start, column.min, column.max),
            end = date_input(&format!("{prefix}_end"), column.end, column.min, column.max),
            min = column.min,
        )
    }

    pub fn render(&self) -> String {
        let body = format!(
            r#"  <h1>Historical Analysis</h1>
  <p class="sub">Average load and generation mix by month, weekday and hour of day.</p>
  {tabs}
  <div class="grid">
  {load}
  {fuel}
  </div>
"#,
            tabs = region_tabs("/history", self.region),
            load = self.column_html(&self.load, "load", ("fuel", &self.fuel)),
            fuel = self.column_html(&self.fuel, "fuel", ("load", &self.load)),
        );
        layout(
            &format!("Historical {} Grid Data", self.region.label()),
            "",
            &body,
        )
    }
}
