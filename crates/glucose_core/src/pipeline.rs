use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use shared::{
    directory::{ChannelPreferences, RemoteGlucoseService, UserDirectory},
    display::{DisplayOption, DisplayOptions, PresentationModel, ReactionTrigger},
    domain::{ChannelKind, Identity, RequestContext},
    error::GlucoseError,
};
use tracing::info;

use crate::{
    aggregator::DataAggregator,
    classifier::classify_directory,
    presentation::{short_mode, PresentationBuilder, DEFAULT_STALE_AFTER_MINUTES},
    reply::{failure_reply, FailureReply},
    resolver::SourceResolver,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub stale_after: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::minutes(DEFAULT_STALE_AFTER_MINUTES),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub model: PresentationModel,
    pub triggers: BTreeSet<ReactionTrigger>,
}

struct Failure {
    error: GlucoseError,
    owner: Option<Identity>,
}

impl Failure {
    fn unowned(error: GlucoseError) -> Self {
        Self { error, owner: None }
    }
}

/// Request entry point: resolve, aggregate, present. Holds no per-request
/// state, so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct Pipeline {
    directory: Arc<dyn UserDirectory>,
    preferences: Arc<dyn ChannelPreferences>,
    remote: Arc<dyn RemoteGlucoseService>,
    presentation: PresentationBuilder,
}

impl Pipeline {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        preferences: Arc<dyn ChannelPreferences>,
        remote: Arc<dyn RemoteGlucoseService>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            directory,
            preferences,
            remote,
            presentation: PresentationBuilder::new(config.stale_after),
        }
    }

    pub async fn handle_request(&self, ctx: &RequestContext) -> Result<Response, GlucoseError> {
        self.handle_request_at(ctx, Utc::now()).await
    }

    pub async fn handle_request_at(
        &self,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<Response, GlucoseError> {
        self.run(ctx, now).await.map_err(|failure| failure.error)
    }

    /// Like [`Pipeline::handle_request`] but with failures already turned into
    /// user-facing replies.
    pub async fn respond(&self, ctx: &RequestContext) -> Result<Response, FailureReply> {
        self.run(ctx, Utc::now())
            .await
            .map_err(|failure| failure_reply(&failure.error, ctx, failure.owner.as_ref()))
    }

    async fn run(&self, ctx: &RequestContext, now: DateTime<Utc>) -> Result<Response, Failure> {
        let endpoint = SourceResolver::new(self.directory.as_ref())
            .resolve(ctx)
            .await
            .map_err(Failure::unowned)?;
        info!(
            invoker = ctx.invoker.id.0,
            scope = ctx.scope.0,
            owner = endpoint.owner_id().map(|id| id.0),
            anonymous = endpoint.is_anonymous(),
            "pipeline: endpoint resolved"
        );

        let owned = |error| Failure {
            error,
            owner: endpoint.owner.clone(),
        };

        let reading = DataAggregator::new(self.remote.as_ref())
            .aggregate(&endpoint)
            .await
            .map_err(owned)?;

        let options = match endpoint.owner_id() {
            Some(owner_id) => self
                .directory
                .display_options(owner_id)
                .await
                .map_err(|err| owned(classify_directory(err)))?
                .unwrap_or_default(),
            None => DisplayOptions::default(),
        };

        let short = self.short_mode(ctx, &options).await.map_err(owned)?;
        let owner = endpoint.owner.as_ref();
        let (model, triggers) = self
            .presentation
            .build(&reading, &options, short, owner, now);
        Ok(Response { model, triggers })
    }

    async fn short_mode(
        &self,
        ctx: &RequestContext,
        options: &DisplayOptions,
    ) -> Result<bool, GlucoseError> {
        if options.contains(DisplayOption::Simple) || ctx.channel_kind != ChannelKind::Text {
            return Ok(short_mode(options, ctx.channel_kind, false));
        }
        let prefers_short = self
            .preferences
            .has_short_display_preference(ctx.channel)
            .await
            .map_err(classify_directory)?;
        Ok(short_mode(options, ctx.channel_kind, prefers_short))
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
