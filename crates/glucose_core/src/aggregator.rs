use std::fmt;

use shared::{
    directory::RemoteGlucoseService,
    domain::EndpointDescriptor,
    error::{FetchError, GlucoseError},
    reading::{mgdl_to_mmol, Delta, DeviceStatus, EntrySeries, Reading, RemoteSettings},
};
use tracing::{debug, warn};

use crate::classifier::classify_fetch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Settings,
    Entries,
    DeviceStatus,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchStage::Settings => "settings",
            FetchStage::Entries => "entries",
            FetchStage::DeviceStatus => "device_status",
        })
    }
}

/// Fetches the three data products of an endpoint in order: settings, then
/// entries, then device status. The first failure ends the request; a
/// `Reading` only exists when all three succeeded.
pub struct DataAggregator<'a> {
    remote: &'a dyn RemoteGlucoseService,
}

impl<'a> DataAggregator<'a> {
    pub fn new(remote: &'a dyn RemoteGlucoseService) -> Self {
        Self { remote }
    }

    pub async fn aggregate(&self, endpoint: &EndpointDescriptor) -> Result<Reading, GlucoseError> {
        let settings = self
            .remote
            .fetch_settings(endpoint)
            .await
            .map_err(|cause| fetch_failed(endpoint, FetchStage::Settings, cause))?;
        let series = self
            .remote
            .fetch_entries(endpoint)
            .await
            .map_err(|cause| fetch_failed(endpoint, FetchStage::Entries, cause))?;
        let status = self
            .remote
            .fetch_device_status(endpoint)
            .await
            .map_err(|cause| fetch_failed(endpoint, FetchStage::DeviceStatus, cause))?;

        let reading = assemble(settings, &series, status)?;
        debug!(
            base_url = %endpoint.base_url,
            mgdl = reading.glucose_mgdl,
            "aggregator: reading assembled"
        );
        Ok(reading)
    }
}

fn fetch_failed(
    endpoint: &EndpointDescriptor,
    stage: FetchStage,
    cause: FetchError,
) -> GlucoseError {
    let classified = classify_fetch(&cause);
    warn!(
        base_url = %endpoint.base_url,
        %stage,
        %cause,
        code = classified.code().as_str(),
        "aggregator: fetch failed"
    );
    classified
}

/// mg/dL from the entries feed is authoritative; mmol values are derived.
pub fn assemble(
    settings: RemoteSettings,
    series: &EntrySeries,
    status: DeviceStatus,
) -> Result<Reading, GlucoseError> {
    let latest = series.latest().ok_or(GlucoseError::NoRemoteData)?;
    let (delta, delta_is_negative) = match series.previous() {
        Some(previous) => {
            let (delta, negative) = Delta::from_mgdl_change(latest.mgdl - previous.mgdl);
            (Some(delta), negative)
        }
        None => (None, false),
    };

    Ok(Reading {
        captured_at: latest.captured_at,
        glucose_mmol: mgdl_to_mmol(latest.mgdl),
        glucose_mgdl: latest.mgdl,
        delta,
        delta_is_negative,
        trend: latest.trend,
        insulin_on_board: status.insulin_on_board,
        carbs_on_board: status.carbs_on_board,
        thresholds: settings.thresholds,
        title: settings.title,
    })
}
