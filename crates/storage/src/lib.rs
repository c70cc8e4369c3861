use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    directory::{ChannelPreferences, UserDirectory},
    display::DisplayOptions,
    domain::{normalize_base_url, ChannelId, EndpointDescriptor, GuildId, Identity, UserId},
};

const IDENTITY_COLUMNS: &str =
    "u.id, COALESCE(u.display_name, u.username) AS display_name, u.avatar_url";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (username) VALUES (?)
             ON CONFLICT(username) DO UPDATE SET username=excluded.username
             RETURNING id",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn set_profile(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        let updated = sqlx::query("UPDATE users SET display_name = ?, avatar_url = ? WHERE id = ?")
            .bind(display_name)
            .bind(avatar_url)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(anyhow!("user {} does not exist", user_id.0));
        }
        Ok(())
    }

    pub async fn identity(&self, user_id: UserId) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!("SELECT {IDENTITY_COLUMNS} FROM users u WHERE u.id = ?"))
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(identity_from_row))
    }

    pub async fn add_membership(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        nickname: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO memberships (guild_id, user_id, nickname)
             VALUES (?, ?, ?)
             ON CONFLICT(guild_id, user_id) DO UPDATE SET nickname=excluded.nickname",
        )
        .bind(guild_id.0)
        .bind(user_id.0)
        .bind(nickname)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stores the endpoint under its normalised origin so URL lookups match
    /// regardless of how the user typed it.
    pub async fn set_endpoint(
        &self,
        user_id: UserId,
        base_url: &str,
        auth_token: Option<&str>,
    ) -> Result<String> {
        let base_url = normalize_base_url(base_url).map_err(|e| anyhow!(e))?;
        sqlx::query(
            "INSERT INTO endpoints (user_id, base_url, auth_token)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE
             SET base_url=excluded.base_url, auth_token=excluded.auth_token",
        )
        .bind(user_id.0)
        .bind(&base_url)
        .bind(auth_token)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to store endpoint for user {}", user_id.0))?;
        Ok(base_url)
    }

    pub async fn set_display_options(
        &self,
        user_id: UserId,
        options: &DisplayOptions,
    ) -> Result<()> {
        let updated = sqlx::query("UPDATE endpoints SET display_options = ? WHERE user_id = ?")
            .bind(options.to_string())
            .bind(user_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(anyhow!("user {} has no endpoint configured", user_id.0));
        }
        Ok(())
    }

    pub async fn set_visibility(
        &self,
        user_id: UserId,
        guild_id: GuildId,
        visible: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO endpoint_visibility (user_id, guild_id, visible)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id, guild_id) DO UPDATE SET visible=excluded.visible",
        )
        .bind(user_id.0)
        .bind(guild_id.0)
        .bind(visible)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_short_display(&self, channel_id: ChannelId, short: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO channel_preferences (channel_id, short_display)
             VALUES (?, ?)
             ON CONFLICT(channel_id) DO UPDATE SET short_display=excluded.short_display",
        )
        .bind(channel_id.0)
        .bind(short)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn visibility_for(&self, user_id: UserId) -> Result<BTreeMap<GuildId, bool>> {
        let rows =
            sqlx::query("SELECT guild_id, visible FROM endpoint_visibility WHERE user_id = ?")
                .bind(user_id.0)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| (GuildId(r.get::<i64, _>(0)), r.get::<bool, _>(1)))
            .collect())
    }
}

fn identity_from_row(row: &SqliteRow) -> Identity {
    Identity {
        id: UserId(row.get::<i64, _>("id")),
        display_name: row.get::<String, _>("display_name"),
        avatar_url: row.get::<Option<String>, _>("avatar_url"),
    }
}

#[async_trait]
impl UserDirectory for Storage {
    async fn stored_endpoint(&self, user_id: UserId) -> Result<Option<EndpointDescriptor>> {
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS}, e.base_url, e.auth_token
             FROM endpoints e
             INNER JOIN users u ON u.id = e.user_id
             WHERE e.user_id = ?"
        ))
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load stored endpoint")?;
        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(EndpointDescriptor {
            base_url: row.get::<String, _>("base_url"),
            auth_token: row.get::<Option<String>, _>("auth_token"),
            owner: Some(identity_from_row(&row)),
            visibility: self.visibility_for(user_id).await?,
        }))
    }

    async fn find_users_for_url(
        &self,
        base_url: &str,
    ) -> Result<Vec<(Identity, EndpointDescriptor)>> {
        let owners: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM endpoints WHERE base_url = ? ORDER BY user_id")
                .bind(base_url)
                .fetch_all(&self.pool)
                .await
                .context("failed to look up endpoints by url")?;

        let mut found = Vec::with_capacity(owners.len());
        for owner in owners {
            if let Some(endpoint) = self.stored_endpoint(UserId(owner)).await? {
                if let Some(identity) = endpoint.owner.clone() {
                    found.push((identity, endpoint));
                }
            }
        }
        Ok(found)
    }

    async fn find_member_by_name(&self, name: &str, scope: GuildId) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS}
             FROM memberships m
             INNER JOIN users u ON u.id = m.user_id
             WHERE m.guild_id = ?1
               AND (lower(u.username) = lower(?2)
                    OR lower(COALESCE(u.display_name, '')) = lower(?2)
                    OR lower(COALESCE(m.nickname, '')) = lower(?2))
             ORDER BY u.id ASC
             LIMIT 1"
        ))
        .bind(scope.0)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up member by name")?;
        Ok(row.as_ref().map(identity_from_row))
    }

    async fn is_mutual_scope(&self, user_id: UserId, scope: GuildId) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM memberships WHERE guild_id = ? AND user_id = ?)",
        )
        .bind(scope.0)
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn display_options(&self, user_id: UserId) -> Result<Option<DisplayOptions>> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT display_options FROM endpoints WHERE user_id = ?")
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await?;
        raw.flatten()
            .map(|raw| DisplayOptions::parse_list(&raw).map_err(|e| anyhow!(e)))
            .transpose()
    }
}

#[async_trait]
impl ChannelPreferences for Storage {
    async fn has_short_display_preference(&self, channel_id: ChannelId) -> Result<bool> {
        let short: Option<bool> =
            sqlx::query_scalar("SELECT short_display FROM channel_preferences WHERE channel_id = ?")
                .bind(channel_id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(short.unwrap_or(false))
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
