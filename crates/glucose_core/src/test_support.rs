use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use shared::{
    directory::{ChannelPreferences, RemoteGlucoseService, UserDirectory},
    display::DisplayOptions,
    domain::{ChannelId, EndpointDescriptor, GuildId, Identity, UserId},
    error::FetchError,
    reading::{
        mgdl_to_mmol, DeviceStatus, Entry, EntrySeries, Reading, RemoteSettings, Thresholds,
        Trend,
    },
};
use tokio::sync::Mutex;

pub fn identity(id: i64, name: &str) -> Identity {
    Identity::new(UserId(id), name)
}

pub fn endpoint_for(
    owner: &Identity,
    base_url: &str,
    visible_in: &[(GuildId, bool)],
) -> EndpointDescriptor {
    EndpointDescriptor {
        base_url: base_url.to_string(),
        auth_token: Some(format!("token-{}", owner.id.0)),
        owner: Some(owner.clone()),
        visibility: visible_in.iter().copied().collect::<BTreeMap<_, _>>(),
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    users: Vec<Identity>,
    endpoints: HashMap<UserId, EndpointDescriptor>,
    members: HashMap<GuildId, Vec<UserId>>,
    options: HashMap<UserId, DisplayOptions>,
    fail_with: Option<String>,
    pub lookups: Arc<Mutex<u32>>,
}

impl FakeDirectory {
    pub fn with_user(mut self, user: &Identity) -> Self {
        self.users.push(user.clone());
        self
    }

    pub fn with_endpoint(mut self, endpoint: EndpointDescriptor) -> Self {
        if let Some(owner) = &endpoint.owner {
            if !self.users.iter().any(|u| u.id == owner.id) {
                self.users.push(owner.clone());
            }
            self.endpoints.insert(owner.id, endpoint);
        }
        self
    }

    pub fn with_member(mut self, scope: GuildId, user: &Identity) -> Self {
        self.members.entry(scope).or_default().push(user.id);
        if !self.users.iter().any(|u| u.id == user.id) {
            self.users.push(user.clone());
        }
        self
    }

    pub fn with_options(mut self, user: &Identity, options: DisplayOptions) -> Self {
        self.options.insert(user.id, options);
        self
    }

    pub fn failing(err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            ..Self::default()
        }
    }

    async fn record(&self) -> Result<()> {
        *self.lookups.lock().await += 1;
        match &self.fail_with {
            Some(err) => Err(anyhow!(err.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn stored_endpoint(&self, user_id: UserId) -> Result<Option<EndpointDescriptor>> {
        self.record().await?;
        Ok(self.endpoints.get(&user_id).cloned())
    }

    async fn find_users_for_url(
        &self,
        base_url: &str,
    ) -> Result<Vec<(Identity, EndpointDescriptor)>> {
        self.record().await?;
        let mut found: Vec<_> = self
            .endpoints
            .values()
            .filter(|endpoint| endpoint.base_url == base_url)
            .filter_map(|endpoint| Some((endpoint.owner.clone()?, endpoint.clone())))
            .collect();
        found.sort_by_key(|(owner, _)| owner.id);
        Ok(found)
    }

    async fn find_member_by_name(&self, name: &str, scope: GuildId) -> Result<Option<Identity>> {
        self.record().await?;
        let Some(members) = self.members.get(&scope) else {
            return Ok(None);
        };
        Ok(self
            .users
            .iter()
            .filter(|user| members.contains(&user.id))
            .find(|user| user.display_name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn is_mutual_scope(&self, user_id: UserId, scope: GuildId) -> Result<bool> {
        self.record().await?;
        Ok(self
            .members
            .get(&scope)
            .is_some_and(|members| members.contains(&user_id)))
    }

    async fn display_options(&self, user_id: UserId) -> Result<Option<DisplayOptions>> {
        self.record().await?;
        Ok(self.options.get(&user_id).cloned())
    }
}

#[derive(Default)]
pub struct FakePreferences {
    short_channels: Vec<ChannelId>,
    pub queried: Arc<Mutex<Vec<ChannelId>>>,
}

impl FakePreferences {
    pub fn short_in(channel: ChannelId) -> Self {
        Self {
            short_channels: vec![channel],
            queried: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ChannelPreferences for FakePreferences {
    async fn has_short_display_preference(&self, channel_id: ChannelId) -> Result<bool> {
        self.queried.lock().await.push(channel_id);
        Ok(self.short_channels.contains(&channel_id))
    }
}

pub struct FakeRemote {
    pub settings: Result<RemoteSettings, FetchError>,
    pub entries: Result<EntrySeries, FetchError>,
    pub status: Result<DeviceStatus, FetchError>,
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub seen_urls: Arc<Mutex<Vec<String>>>,
}

impl FakeRemote {
    pub fn ok(latest_mgdl: i32, previous_mgdl: Option<i32>, captured_at: DateTime<Utc>) -> Self {
        let mut entries = vec![Entry {
            mgdl: latest_mgdl,
            captured_at,
            trend: Trend::from_code(4),
        }];
        if let Some(previous) = previous_mgdl {
            entries.push(Entry {
                mgdl: previous,
                captured_at: captured_at - chrono::Duration::minutes(5),
                trend: Trend::from_code(4),
            });
        }
        Self {
            settings: Ok(RemoteSettings {
                title: "Bob's CGM".into(),
                thresholds: thresholds(),
            }),
            entries: Ok(EntrySeries { entries }),
            status: Ok(DeviceStatus {
                insulin_on_board: 1.25,
                carbs_on_board: 12,
            }),
            calls: Arc::new(Mutex::new(Vec::new())),
            seen_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn record(&self, call: &'static str, endpoint: &EndpointDescriptor) {
        self.calls.lock().await.push(call);
        self.seen_urls.lock().await.push(endpoint.base_url.clone());
    }
}

#[async_trait]
impl RemoteGlucoseService for FakeRemote {
    async fn fetch_settings(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<RemoteSettings, FetchError> {
        self.record("settings", endpoint).await;
        self.settings.clone()
    }

    async fn fetch_entries(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<EntrySeries, FetchError> {
        self.record("entries", endpoint).await;
        self.entries.clone()
    }

    async fn fetch_device_status(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<DeviceStatus, FetchError> {
        self.record("device_status", endpoint).await;
        self.status.clone()
    }
}

pub fn thresholds() -> Thresholds {
    Thresholds::new(70.0, 80.0, 170.0, 250.0).expect("ordered thresholds")
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn reading(mgdl: i32) -> Reading {
    Reading {
        captured_at: fixed_now(),
        glucose_mmol: mgdl_to_mmol(mgdl),
        glucose_mgdl: mgdl,
        delta: None,
        delta_is_negative: false,
        trend: Trend::from_code(4),
        insulin_on_board: 0.0,
        carbs_on_board: 0,
        thresholds: thresholds(),
        title: "Nightscout".into(),
    }
}
