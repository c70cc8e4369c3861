use anyhow::Result;
use async_trait::async_trait;

use crate::{
    display::DisplayOptions,
    domain::{ChannelId, EndpointDescriptor, GuildId, Identity, UserId},
    error::FetchError,
    reading::{DeviceStatus, EntrySeries, RemoteSettings},
};

/// Read-only view of stored users and their endpoints.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn stored_endpoint(&self, user_id: UserId) -> Result<Option<EndpointDescriptor>>;
    /// Stored endpoints whose normalised base URL equals `base_url`.
    async fn find_users_for_url(&self, base_url: &str)
        -> Result<Vec<(Identity, EndpointDescriptor)>>;
    async fn find_member_by_name(&self, name: &str, scope: GuildId) -> Result<Option<Identity>>;
    async fn is_mutual_scope(&self, user_id: UserId, scope: GuildId) -> Result<bool>;
    async fn display_options(&self, user_id: UserId) -> Result<Option<DisplayOptions>>;
}

#[async_trait]
pub trait ChannelPreferences: Send + Sync {
    async fn has_short_display_preference(&self, channel_id: ChannelId) -> Result<bool>;
}

#[async_trait]
pub trait RemoteGlucoseService: Send + Sync {
    async fn fetch_settings(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<RemoteSettings, FetchError>;
    async fn fetch_entries(&self, endpoint: &EndpointDescriptor)
        -> Result<EntrySeries, FetchError>;
    async fn fetch_device_status(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<DeviceStatus, FetchError>;
}
