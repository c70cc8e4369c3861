use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GlucoseError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(GuildId);
id_newtype!(ChannelId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Other,
}

/// A user handle as supplied by the directory. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// A remote glucose data source. Anonymous when `owner` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub owner: Option<Identity>,
    pub visibility: BTreeMap<GuildId, bool>,
}

impl EndpointDescriptor {
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            owner: None,
            visibility: BTreeMap::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.owner.is_none()
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner.as_ref().map(|owner| owner.id)
    }

    /// Same URL with owner, token and visibility stripped.
    pub fn into_anonymous(self) -> Self {
        Self::anonymous(self.base_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub invoker: Identity,
    pub args: Vec<String>,
    pub mentions: Vec<Identity>,
    pub mentions_everyone: bool,
    pub scope: GuildId,
    pub channel: ChannelId,
    pub channel_kind: ChannelKind,
}

impl RequestContext {
    pub fn new(invoker: Identity, scope: GuildId, channel: ChannelId) -> Self {
        Self {
            invoker,
            args: Vec::new(),
            mentions: Vec::new(),
            mentions_everyone: false,
            scope,
            channel,
            channel_kind: ChannelKind::Text,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mentions(mut self, mentions: Vec<Identity>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn with_everyone(mut self) -> Self {
        self.mentions_everyone = true;
        self
    }

    pub fn with_channel_kind(mut self, channel_kind: ChannelKind) -> Self {
        self.channel_kind = channel_kind;
        self
    }

    pub fn is_invoker(&self, user_id: UserId) -> bool {
        self.invoker.id == user_id
    }
}

/// True for tokens shaped like `scheme://...`.
pub fn looks_like_url(token: &str) -> bool {
    let Some((scheme, rest)) = token.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        && !rest.is_empty()
}

const API_SUFFIX: &str = "/api/v1";

/// Canonical form of an endpoint URL, e.g. `HTTPS://Bob.example.com/NS/api/v1/`
/// -> `https://bob.example.com/NS`. Scheme and host are lowercased, the path
/// is kept minus a trailing `/api/v1` and slashes, query and fragment are
/// dropped. Only http(s) URLs with a host are accepted.
pub fn normalize_base_url(raw: &str) -> Result<String, GlucoseError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| GlucoseError::InvalidArgument(format!("'{raw}' is not a valid url: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GlucoseError::InvalidArgument(format!(
            "unsupported url scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(GlucoseError::InvalidArgument(format!("'{raw}' has no host")));
    }

    let mut path = parsed.path().trim_end_matches('/');
    if path.len() >= API_SUFFIX.len()
        && path[path.len() - API_SUFFIX.len()..].eq_ignore_ascii_case(API_SUFFIX)
    {
        path = path[..path.len() - API_SUFFIX.len()].trim_end_matches('/');
    }
    Ok(format!("{}{path}", parsed.origin().ascii_serialization()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_absolute_urls() {
        assert!(looks_like_url("https://bob.example.com"));
        assert!(looks_like_url("git+ssh://host"));
        assert!(!looks_like_url("bob"));
        assert!(!looks_like_url("://host"));
        assert!(!looks_like_url("https://"));
    }

    #[test]
    fn normalizes_scheme_and_host() {
        assert_eq!(
            normalize_base_url("https://Bob.Example.com/api/v1/").expect("url"),
            "https://bob.example.com"
        );
        assert_eq!(
            normalize_base_url("http://localhost:1337/").expect("url"),
            "http://localhost:1337"
        );
    }

    #[test]
    fn keeps_site_path_and_drops_api_suffix() {
        assert_eq!(
            normalize_base_url("https://host.example.com/nightscout/").expect("url"),
            "https://host.example.com/nightscout"
        );
        assert_eq!(
            normalize_base_url("HTTPS://Host.Example.com:443/Sites/NS/API/v1/?token=x#top")
                .expect("url"),
            "https://host.example.com/Sites/NS"
        );
        assert_eq!(
            normalize_base_url("https://host.example.com/api/v1").expect("url"),
            "https://host.example.com"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = normalize_base_url("ftp://bob.example.com").expect_err("scheme");
        assert!(matches!(err, GlucoseError::InvalidArgument(_)));
        let err = normalize_base_url("https://exa mple.com").expect_err("parse");
        assert!(matches!(err, GlucoseError::InvalidArgument(_)));
    }

    #[test]
    fn anonymous_descriptor_drops_owner_and_token() {
        let descriptor = EndpointDescriptor {
            base_url: "https://bob.example.com".into(),
            auth_token: Some("secret".into()),
            owner: Some(Identity::new(UserId(2), "bob")),
            visibility: BTreeMap::from([(GuildId(1), true)]),
        };
        let anonymous = descriptor.into_anonymous();
        assert!(anonymous.is_anonymous());
        assert_eq!(anonymous.auth_token, None);
        assert!(anonymous.visibility.is_empty());
    }
}
