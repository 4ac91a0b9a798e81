//! Runtime configuration: defaults, an optional YAML file, then environment overrides.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub http_addr: String,
    /// Postgres URL; unset means serve from the in-memory store.
    pub database_url: Option<String>,
    pub cache_ttl_secs: u64,
    /// Auto-refresh period of the realtime page.
    pub refresh_secs: u64,
    /// Pin "today" to a fixed date, handy for demos against a frozen dataset.
    pub today: Option<NaiveDate>,
    pub forecast: bool,
    /// YAML fixture loaded into the in-memory store.
    pub seed_path: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8501".to_string(),
            database_url: None,
            cache_ttl_secs: 600,
            refresh_secs: 300,
            today: None,
            forecast: true,
            seed_path: None,
        }
    }
}

impl DashboardConfig {
    /// Load from `DASHBOARD_CONFIG` (if set) and apply environment overrides on top.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var("DASHBOARD_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading dashboard config {path}"))?;
                Self::from_yaml_str(&raw)?
            }
            Err(_) => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("parsing dashboard config yaml")
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(addr) = lookup("DASHBOARD_HTTP_ADDR") {
            self.http_addr = addr;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.database_url = Some(url);
        }
        if let Some(ttl) = lookup("DASHBOARD_CACHE_TTL_SECS") {
            self.cache_ttl_secs = ttl
                .trim()
                .parse()
                .context("parsing DASHBOARD_CACHE_TTL_SECS")?;
        }
        if let Some(refresh) = lookup("DASHBOARD_REFRESH_SECS") {
            self.refresh_secs = refresh
                .trim()
                .parse()
                .context("parsing DASHBOARD_REFRESH_SECS")?;
        }
        if let Some(today) = lookup("DASHBOARD_TODAY").filter(|v| !v.trim().is_empty()) {
            let date = NaiveDate::parse_from_str(today.trim(), "%Y-%m-%d")
                .context("parsing DASHBOARD_TODAY (expected YYYY-MM-DD)")?;
            self.today = Some(date);
        }
        if let Some(flag) = lookup("DASHBOARD_FORECAST") {
            self.forecast = truthy(&flag);
        }
        if let Some(path) = lookup("DASHBOARD_SEED_PATH").filter(|v| !v.trim().is_empty()) {
            self.seed_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

fn truthy(v: &str) -> bool {
    let v = v.trim().to_lowercase();
    v == "1" || v == "true" || v == "yes" || v == "on"
}
