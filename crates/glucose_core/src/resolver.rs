use shared::{
    directory::UserDirectory,
    domain::{looks_like_url, normalize_base_url, EndpointDescriptor, Identity, RequestContext},
    error::GlucoseError,
};
use tracing::{debug, info};

use crate::{classifier::classify_directory, privacy::is_visible};

const HEROKU_SUFFIX: &str = "herokuapp.com";
const MAX_HOST_LABEL_LEN: usize = 63;

/// Decides which endpoint a request refers to. Resolution never touches the
/// network and never caches; the same context against an unchanged directory
/// always yields the same descriptor.
pub struct SourceResolver<'a> {
    directory: &'a dyn UserDirectory,
}

impl<'a> SourceResolver<'a> {
    pub fn new(directory: &'a dyn UserDirectory) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, ctx: &RequestContext) -> Result<EndpointDescriptor, GlucoseError> {
        if ctx.mentions.len() > 1 {
            return Err(GlucoseError::TooManyMentions);
        }
        if ctx.mentions_everyone {
            return Err(GlucoseError::EveryoneMentioned);
        }

        if let [mentioned] = ctx.mentions.as_slice() {
            return self.resolve_mentioned(ctx, mentioned).await;
        }

        let first = ctx
            .args
            .iter()
            .map(|arg| arg.trim())
            .find(|arg| !arg.is_empty());
        match first {
            None => self.resolve_self(ctx).await,
            Some(token) if looks_like_url(token) => self.resolve_url(ctx, token).await,
            Some(token) => self.resolve_name(ctx, token).await,
        }
    }

    async fn resolve_self(&self, ctx: &RequestContext) -> Result<EndpointDescriptor, GlucoseError> {
        let mut endpoint = self
            .directory
            .stored_endpoint(ctx.invoker.id)
            .await
            .map_err(classify_directory)?
            .ok_or(GlucoseError::Unconfigured)?;
        endpoint.owner.get_or_insert_with(|| ctx.invoker.clone());
        debug!(user_id = ctx.invoker.id.0, "resolver: resolved invoker's own endpoint");
        Ok(endpoint)
    }

    async fn resolve_mentioned(
        &self,
        ctx: &RequestContext,
        mentioned: &Identity,
    ) -> Result<EndpointDescriptor, GlucoseError> {
        let mut endpoint = self
            .directory
            .stored_endpoint(mentioned.id)
            .await
            .map_err(classify_directory)?
            .ok_or_else(|| GlucoseError::NoConfiguredUrl(mentioned.clone()))?;

        if !is_visible(&endpoint.visibility, ctx.scope, ctx.is_invoker(mentioned.id)) {
            info!(
                scope = ctx.scope.0,
                target_user_id = mentioned.id.0,
                "resolver: mentioned user's endpoint is private in scope"
            );
            return Err(GlucoseError::PrivateData(Some(mentioned.clone())));
        }

        endpoint.owner.get_or_insert_with(|| mentioned.clone());
        Ok(endpoint)
    }

    /// A matching stored owner is attached only when they share the scope and
    /// have opted in; otherwise the URL is queried anonymously so the lookup
    /// cannot reveal who owns a domain.
    async fn resolve_url(
        &self,
        ctx: &RequestContext,
        raw: &str,
    ) -> Result<EndpointDescriptor, GlucoseError> {
        let base_url = normalize_base_url(raw)?;
        let mut matches = self
            .directory
            .find_users_for_url(&base_url)
            .await
            .map_err(classify_directory)?;

        if matches.len() != 1 {
            debug!(
                matches = matches.len(),
                "resolver: url does not map to a single stored owner, querying anonymously"
            );
            return Ok(EndpointDescriptor::anonymous(base_url));
        }
        let Some((owner, mut endpoint)) = matches.pop() else {
            return Ok(EndpointDescriptor::anonymous(base_url));
        };

        if ctx.is_invoker(owner.id) {
            endpoint.owner = Some(owner);
            return Ok(endpoint);
        }

        let mutual = self
            .directory
            .is_mutual_scope(owner.id, ctx.scope)
            .await
            .map_err(classify_directory)?;
        if !mutual {
            return Ok(endpoint.into_anonymous());
        }

        if !is_visible(&endpoint.visibility, ctx.scope, false) {
            info!(
                scope = ctx.scope.0,
                target_user_id = owner.id.0,
                "resolver: url owner's endpoint is private in scope"
            );
            return Err(GlucoseError::PrivateData(Some(owner)));
        }

        endpoint.owner = Some(owner);
        Ok(endpoint)
    }

    async fn resolve_name(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<EndpointDescriptor, GlucoseError> {
        let name = token.strip_prefix('@').unwrap_or(token);
        let member = self
            .directory
            .find_member_by_name(name, ctx.scope)
            .await
            .map_err(classify_directory)?;

        if let Some(member) = member {
            let stored = self
                .directory
                .stored_endpoint(member.id)
                .await
                .map_err(classify_directory)?;
            if let Some(mut endpoint) = stored {
                if !is_visible(&endpoint.visibility, ctx.scope, ctx.is_invoker(member.id)) {
                    return Err(GlucoseError::PrivateData(Some(member)));
                }
                endpoint.owner.get_or_insert(member);
                return Ok(endpoint);
            }
        }

        heroku_fallback(name)
    }
}

fn heroku_fallback(name: &str) -> Result<EndpointDescriptor, GlucoseError> {
    let valid_label = !name.is_empty()
        && name.len() <= MAX_HOST_LABEL_LEN
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid_label {
        return Err(GlucoseError::InvalidArgument(format!(
            "'{name}' is neither a member nor a valid site name"
        )));
    }
    let base_url = normalize_base_url(&format!("https://{name}.{HEROKU_SUFFIX}"))?;
    Ok(EndpointDescriptor::anonymous(base_url))
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
