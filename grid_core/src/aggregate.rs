//! Calendar aggregation for the historical views.
//! Rows are bucketed by month-of-year, weekday or hour-of-day and averaged per bucket.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::{SeriesRow, catalog::CatalogError};

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Weekly,
    Hourly,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Monthly, Granularity::Weekly, Granularity::Hourly];

    pub fn key(self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Weekly => "weekly",
            Granularity::Hourly => "hourly",
        }
    }

    pub fn bucket_count(self) -> usize {
        match self {
            Granularity::Monthly => 12,
            Granularity::Weekly => 7,
            Granularity::Hourly => 24,
        }
    }

    /// Zero-based bucket for a timestamp. Weekdays start on Monday.
    pub fn bucket_of(self, t: NaiveDateTime) -> usize {
        match self {
            Granularity::Monthly => t.month0() as usize,
            Granularity::Weekly => t.weekday().num_days_from_monday() as usize,
            Granularity::Hourly => t.hour() as usize,
        }
    }

    /// Axis coordinate of a bucket: months run 1..=12, weekdays 0..=6, hours 0..=23.
    pub fn axis_value(self, bucket: usize) -> f64 {
        match self {
            Granularity::Monthly => bucket as f64 + 1.0,
            Granularity::Weekly | Granularity::Hourly => bucket as f64,
        }
    }

    pub fn bucket_label(self, bucket: usize) -> String {
        match self {
            Granularity::Monthly => MONTH_LABELS.get(bucket).copied().unwrap_or("?").to_string(),
            Granularity::Weekly => WEEKDAY_LABELS.get(bucket).copied().unwrap_or("?").to_string(),
            Granularity::Hourly => format!("{bucket}:00"),
        }
    }

    pub fn axis_title(self) -> &'static str {
        match self {
            Granularity::Monthly => "Month",
            Granularity::Weekly => "Weekday",
            Granularity::Hourly => "Hour of Day",
        }
    }

    pub fn title_suffix(self) -> &'static str {
        match self {
            Granularity::Monthly => "Monthly Averages",
            Granularity::Weekly => "Daily Averages by Weekday",
            Granularity::Hourly => "Hourly Averages",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Granularity {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Granularity::Monthly),
            "weekly" | "weekday" => Ok(Granularity::Weekly),
            "hourly" | "hour" | "daily" => Ok(Granularity::Hourly),
            _ => Err(CatalogError::UnknownGranularity(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Per-bucket mean load for one calendar year.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearLine {
    pub year: i32,
    pub means: Vec<Option<f64>>,
}

/// Load averages per bucket, split by year, plus the average over all years.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadProfile {
    pub granularity: Granularity,
    pub years: Vec<YearLine>,
    pub overall: Vec<Option<f64>>,
}

/// Mean generation per fuel source and bucket. `means[source][bucket]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FuelMixProfile {
    pub granularity: Granularity,
    pub sources: Vec<String>,
    pub means: Vec<Vec<Option<f64>>>,
}

impl FuelMixProfile {
    /// `(bottom, top)` of every source's bar in one bucket; `None` when the bucket saw no rows.
    pub fn stacked_bucket(&self, bucket: usize) -> Option<Vec<(f64, f64)>> {
        let column: Vec<Option<f64>> = self
            .means
            .iter()
            .map(|m| m.get(bucket).copied().flatten())
            .collect();
        if column.iter().all(Option::is_none) {
            return None;
        }
        Some(stack(column))
    }
}

/// Fuel values are clipped to non-negative; missing or non-finite values count as zero.
pub fn clip_fuel(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0)
}

/// Stack values bottom-up in the given order, returning `(bottom, top)` per layer.
pub fn stack(values: impl IntoIterator<Item = Option<f64>>) -> Vec<(f64, f64)> {
    let mut bottom = 0.0;
    values
        .into_iter()
        .map(|v| {
            let top = bottom + clip_fuel(v);
            let layer = (bottom, top);
            bottom = top;
            layer
        })
        .collect()
}

/// Group load rows (column 0) by bucket; NULL loads are skipped rather than averaged as zero.
pub fn load_profile(rows: &[SeriesRow], granularity: Granularity) -> LoadProfile {
    let n = granularity.bucket_count();
    let mut overall = vec![Mean::default(); n];
    let mut per_year: BTreeMap<i32, Vec<Mean>> = BTreeMap::new();

    for row in rows {
        let Some(load) = row.value(0).filter(|v| v.is_finite()) else {
            continue;
        };
        let bucket = granularity.bucket_of(row.time);
        overall[bucket].add(load);
        per_year
            .entry(row.time.year())
            .or_insert_with(|| vec![Mean::default(); n])[bucket]
            .add(load);
    }

    LoadProfile {
        granularity,
        years: per_year
            .into_iter()
            .map(|(year, means)| YearLine {
                year,
                means: means.into_iter().map(Mean::value).collect(),
            })
            .collect(),
        overall: overall.into_iter().map(Mean::value).collect(),
    }
}

/// Group fuel-mix rows by bucket. `sources` gives the column order of `row.values`.
pub fn fuel_mix_profile(
    rows: &[SeriesRow],
    sources: &[&str],
    granularity: Granularity,
) -> FuelMixProfile {
    let n = granularity.bucket_count();
    let mut counts = vec![0usize; n];
    let mut sums = vec![vec![0.0f64; n]; sources.len()];

    for row in rows {
        let bucket = granularity.bucket_of(row.time);
        counts[bucket] += 1;
        for (idx, sum) in sums.iter_mut().enumerate() {
            sum[bucket] += clip_fuel(row.value(idx));
        }
    }

    let means = sums
        .into_iter()
        .map(|sum| {
            sum.into_iter()
                .zip(counts.iter())
                .map(|(s, &c)| (c > 0).then(|| s / c as f64))
                .collect()
        })
        .collect();

    FuelMixProfile {
        granularity,
        sources: sources.iter().map(|s| s.to_string()).collect(),
        means,
    }
}
