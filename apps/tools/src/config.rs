use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use chrono::TimeDelta;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "bgtool.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub fetch_timeout_secs: u64,
    pub stale_after_minutes: i64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/bgtool.db".into(),
            fetch_timeout_secs: 10,
            stale_after_minutes: 15,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> anyhow::Result<Duration> {
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be at least 1");
        }
        Ok(Duration::from_secs(self.fetch_timeout_secs))
    }

    pub fn stale_after(&self) -> anyhow::Result<TimeDelta> {
        if self.stale_after_minutes <= 0 {
            bail!(
                "stale_after_minutes must be positive, got {}",
                self.stale_after_minutes
            );
        }
        TimeDelta::try_minutes(self.stale_after_minutes).with_context(|| {
            format!(
                "stale_after_minutes {} is out of range",
                self.stale_after_minutes
            )
        })
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.fetch_timeout()?;
        self.stale_after()?;
        Ok(())
    }
}

/// Defaults, then `bgtool.toml` (or `path`), then environment overrides.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings.validate().context("invalid bgtool settings")?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("database_url").and_then(toml::Value::as_str) {
        settings.database_url = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("fetch_timeout_secs")
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.fetch_timeout_secs = v;
    }
    if let Some(v) = file_cfg
        .get("stale_after_minutes")
        .and_then(toml::Value::as_integer)
    {
        settings.stale_after_minutes = v;
    }
    if let Some(v) = file_cfg.get("log_filter").and_then(toml::Value::as_str) {
        settings.log_filter = v.to_string();
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("APP__FETCH_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.fetch_timeout_secs = parsed;
        }
    }

    if let Some(v) = var("APP__STALE_AFTER_MINUTES") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.stale_after_minutes = parsed;
        }
    }

    if let Some(v) = var("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

/// Plain file paths become `sqlite://` urls; the store creates missing
/// parent directories itself.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}
