//! One chart builder per view type. Every page and `/charts` endpoint goes through these.

use chrono::NaiveDateTime;
use grid_core::{ForecastRow, FuelMixProfile, Granularity, LoadProfile, Region, stack};

use crate::{
    chart::{Axis, Band, BarLayer, Chart, LineSeries, cycle_color, fuel_color},
    loader::DayView,
};

const DAY_MINUTES: f64 = 1440.0;
/// Bar width when a day has a single fuel-mix sample (5-minute feeds are usually denser).
const DEFAULT_BAR_MINUTES: f64 = 14.4;
const AVERAGE_COLOR: &str = "blue";
const FORECAST_COLOR: &str = "#ff7f0e";

fn minutes_since(origin: NaiveDateTime, t: NaiveDateTime) -> f64 {
    (t - origin).num_seconds() as f64 / 60.0
}

const GENERATION_TITLE: &str = "Total Energy Generation (MW)";

/// 00:00 to 24:00 of the displayed day, one tick per hour.
fn day_axis() -> Axis {
    Axis {
        title: "Hour of Day".to_string(),
        min: 0.0,
        max: DAY_MINUTES,
        ticks: (0..=24)
            .map(|h| (h as f64 * 60.0, format!("{h:02}:00")))
            .collect(),
    }
}

fn profile_axis(granularity: Granularity) -> Axis {
    let n = granularity.bucket_count();
    Axis {
        title: granularity.axis_title().to_string(),
        min: granularity.axis_value(0) - 0.5,
        max: granularity.axis_value(n - 1) + 0.5,
        ticks: (0..n)
            .map(|b| (granularity.axis_value(b), granularity.bucket_label(b)))
            .collect(),
    }
}

pub fn realtime_load_chart(day: &DayView, forecast: &[ForecastRow]) -> Chart {
    let region = day.table.region;
    let mut chart = Chart::new(
        format!("Realtime {} Load Data", region.display_name()),
        day_axis(),
        "Load (MW)",
    );
    let origin = day.window.start;

    if !forecast.is_empty() {
        chart.bands.push(Band {
            label: "Forecast interval".into(),
            points: forecast
                .iter()
                .map(|f| (minutes_since(origin, f.ds), f.yhat_lower, f.yhat_upper))
                .collect(),
            color: FORECAST_COLOR.into(),
        });
        chart.lines.push(LineSeries {
            label: "Forecast".into(),
            points: forecast
                .iter()
                .map(|f| (minutes_since(origin, f.ds), f.yhat))
                .collect(),
            color: FORECAST_COLOR.into(),
            width: 2.0,
            opacity: 1.0,
            dashed: true,
        });
    }

    chart.lines.push(LineSeries {
        label: "Load".into(),
        points: day
            .rows
            .iter()
            .filter_map(|r| Some((minutes_since(origin, r.time), r.value(0)?)))
            .collect(),
        color: AVERAGE_COLOR.into(),
        width: 2.0,
        opacity: 1.0,
        dashed: false,
    });
    if day.rows.is_empty() {
        chart.note = Some("No data".into());
    }
    chart
}

/// Narrowest positive gap between consecutive samples, in minutes.
fn sample_spacing(times: &[NaiveDateTime]) -> f64 {
    times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 60.0)
        .filter(|gap| *gap > 0.0)
        .fold(None, |acc: Option<f64>, gap| Some(acc.map_or(gap, |a| a.min(gap))))
        .unwrap_or(DEFAULT_BAR_MINUTES)
}

pub fn realtime_fuel_chart(day: &DayView) -> Chart {
    let region = day.table.region;
    let sources = region.fuel_sources();
    let mut chart = Chart::new(
        format!("Realtime {} Fuel Mix", region.display_name()),
        day_axis(),
        GENERATION_TITLE,
    );
    chart.legend_title = "Energy Sources".into();
    let origin = day.window.start;
    let times: Vec<NaiveDateTime> = day.rows.iter().map(|r| r.time).collect();
    chart.bar_width = sample_spacing(&times);

    let mut layers: Vec<BarLayer> = sources
        .iter()
        .enumerate()
        .map(|(idx, source)| BarLayer {
            label: source.to_string(),
            color: fuel_color(idx, sources.len()).into(),
            segments: Vec::with_capacity(day.rows.len()),
        })
        .collect();
    for row in day.rows.iter() {
        let x = minutes_since(origin, row.time);
        let stacked = stack((0..sources.len()).map(|idx| row.value(idx)));
        for (layer, (bottom, top)) in layers.iter_mut().zip(stacked) {
            layer.segments.push((x, bottom, top));
        }
    }
    chart.bars = layers;
    if day.rows.is_empty() {
        chart.note = Some("No data".into());
    }
    chart
}

pub fn load_profile_chart(region: Region, profile: &LoadProfile) -> Chart {
    let g = profile.granularity;
    let mut chart = Chart::new(
        format!("Historical {} Load Data - {}", region.display_name(), g.title_suffix()),
        profile_axis(g),
        "Load (MW)",
    );
    chart.legend_title = "Year".into();
    let points = |means: &[Option<f64>]| -> Vec<(f64, f64)> {
        means
            .iter()
            .enumerate()
            .filter_map(|(b, m)| Some((g.axis_value(b), (*m)?)))
            .collect()
    };
    for (idx, year) in profile.years.iter().enumerate() {
        chart.lines.push(LineSeries {
            label: year.year.to_string(),
            points: points(&year.means),
            color: cycle_color(idx).into(),
            width: 1.5,
            opacity: 0.3,
            dashed: false,
        });
    }
    if !profile.years.is_empty() {
        chart.lines.push(LineSeries {
            label: "Average Load".into(),
            points: points(&profile.overall),
            color: AVERAGE_COLOR.into(),
            width: 3.0,
            opacity: 1.0,
            dashed: false,
        });
    }
    chart
}

pub fn fuel_profile_chart(region: Region, profile: &FuelMixProfile) -> Chart {
    let g = profile.granularity;
    let mut chart = Chart::new(
        format!("Historical {} Fuel Mix - {}", region.display_name(), g.title_suffix()),
        profile_axis(g),
        GENERATION_TITLE,
    );
    chart.legend_title = "Energy Sources".into();
    chart.bar_width = 0.8;

    let n = profile.sources.len();
    let mut layers: Vec<BarLayer> = profile
        .sources
        .iter()
        .enumerate()
        .map(|(idx, source)| BarLayer {
            label: source.clone(),
            color: fuel_color(idx, n).into(),
            segments: Vec::new(),
        })
        .collect();
    for bucket in 0..g.bucket_count() {
        let Some(stacked) = profile.stacked_bucket(bucket) else {
            continue;
        };
        let x = g.axis_value(bucket);
        for (layer, (bottom, top)) in layers.iter_mut().zip(stacked) {
            layer.segments.push((x, bottom, top));
        }
    }
    chart.bars = layers;
    chart
}
