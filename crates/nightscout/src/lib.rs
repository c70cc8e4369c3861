use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    directory::RemoteGlucoseService,
    domain::EndpointDescriptor,
    error::FetchError,
    reading::{DeviceStatus, Entry, EntrySeries, RemoteSettings, Thresholds, Trend},
};
use tracing::debug;

const STATUS_PATH: &str = "/api/v1/status.json";
const ENTRIES_PATH: &str = "/api/v1/entries/sgv.json";
const PEBBLE_PATH: &str = "/pebble";
const DEFAULT_TITLE: &str = "Nightscout";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Latest reading plus its predecessor for the delta.
const ENTRY_COUNT: u32 = 2;

#[derive(Debug, Clone)]
pub struct NightscoutConfig {
    pub timeout: Duration,
}

impl Default for NightscoutConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    settings: SettingsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsPayload {
    #[serde(default)]
    custom_title: Option<String>,
    thresholds: ThresholdsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdsPayload {
    bg_high: f64,
    bg_target_top: f64,
    bg_target_bottom: f64,
    bg_low: f64,
}

#[derive(Debug, Deserialize)]
struct EntryPayload {
    sgv: f64,
    date: i64,
    #[serde(default)]
    trend: Option<i64>,
    #[serde(default)]
    direction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PebblePayload {
    #[serde(default)]
    bgs: Vec<PebbleBg>,
}

#[derive(Debug, Deserialize)]
struct PebbleBg {
    #[serde(default)]
    iob: Option<Numeric>,
    #[serde(default)]
    cob: Option<Numeric>,
}

/// Pebble fields arrive as either JSON numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Result<f64, FetchError> {
        match self {
            Numeric::Number(value) => Ok(*value),
            Numeric::Text(text) if text.trim().is_empty() => Ok(0.0),
            Numeric::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| FetchError::Malformed(format!("'{text}' is not a number"))),
        }
    }
}

#[derive(Clone)]
pub struct NightscoutClient {
    http: Client,
}

impl NightscoutClient {
    pub fn new(config: NightscoutConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build nightscout http client")?;
        Ok(Self { http })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &EndpointDescriptor,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{path}", endpoint.base_url.trim_end_matches('/'));
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .query(query);
        if let Some(token) = &endpoint.auth_token {
            request = request.query(&[("token", token)]);
        }

        debug!(base_url = %endpoint.base_url, path, "nightscout: GET");
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::Empty);
        }
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Unreachable(err.to_string())
    } else if err.is_decode() || err.is_body() {
        FetchError::Malformed(err.to_string())
    } else {
        FetchError::Other(err.to_string())
    }
}

#[async_trait]
impl RemoteGlucoseService for NightscoutClient {
    async fn fetch_settings(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<RemoteSettings, FetchError> {
        let payload: StatusPayload = self.get_json(endpoint, STATUS_PATH, &[]).await?;
        let t = payload.settings.thresholds;
        let thresholds = Thresholds::new(t.bg_low, t.bg_target_bottom, t.bg_target_top, t.bg_high)
            .ok_or_else(|| FetchError::Malformed("thresholds are not ordered".to_string()))?;
        let title = payload
            .settings
            .custom_title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        Ok(RemoteSettings { title, thresholds })
    }

    async fn fetch_entries(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<EntrySeries, FetchError> {
        let payload: Vec<EntryPayload> = self
            .get_json(endpoint, ENTRIES_PATH, &[("count", ENTRY_COUNT.to_string())])
            .await?;
        if payload.is_empty() {
            return Err(FetchError::Empty);
        }

        let mut entries = payload
            .into_iter()
            .map(|entry| {
                let captured_at = DateTime::from_timestamp_millis(entry.date).ok_or_else(|| {
                    FetchError::Malformed(format!("invalid entry timestamp {}", entry.date))
                })?;
                let trend = match (entry.trend, entry.direction.as_deref()) {
                    (Some(code), _) => Trend::from_code(code),
                    (None, Some(direction)) => Trend::from_direction(direction),
                    (None, None) => Trend::UNKNOWN,
                };
                Ok(Entry {
                    mgdl: entry.sgv.round() as i32,
                    captured_at,
                    trend,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;
        entries.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(EntrySeries { entries })
    }

    async fn fetch_device_status(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<DeviceStatus, FetchError> {
        let payload: PebblePayload = self.get_json(endpoint, PEBBLE_PATH, &[]).await?;
        let latest = payload.bgs.first().ok_or(FetchError::Empty)?;
        let insulin_on_board = latest.iob.as_ref().map(Numeric::value).transpose()?.unwrap_or(0.0);
        let carbs_on_board = latest.cob.as_ref().map(Numeric::value).transpose()?.unwrap_or(0.0);
        Ok(DeviceStatus {
            insulin_on_board,
            carbs_on_board: carbs_on_board.round() as i32,
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
