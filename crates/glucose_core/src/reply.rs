use shared::{
    domain::{Identity, RequestContext},
    error::GlucoseError,
};
use tracing::{debug, error, warn};

/// What the transport should do with a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReply {
    Message(String),
    /// A lightweight failure marker (e.g. a reaction) without text.
    Acknowledge,
}

/// Maps a classified error to user-facing output. `owner` is the identity the
/// request resolved to, if any; it decides how an unauthorised endpoint is
/// reported. Tokens never appear in replies.
pub fn failure_reply(
    err: &GlucoseError,
    ctx: &RequestContext,
    owner: Option<&Identity>,
) -> FailureReply {
    match err {
        GlucoseError::Unconfigured => FailureReply::Message(
            "You have not set a Nightscout URL yet.".to_string(),
        ),
        GlucoseError::NoConfiguredUrl(who) => FailureReply::Message(format!(
            "{} has not set a Nightscout URL.",
            who.display_name
        )),
        GlucoseError::TooManyMentions => FailureReply::Message(
            "Only one user can be looked up at a time.".to_string(),
        ),
        GlucoseError::EveryoneMentioned => {
            FailureReply::Message("Everyone cannot be looked up at once.".to_string())
        }
        GlucoseError::PrivateData(Some(who)) => FailureReply::Message(format!(
            "{}'s Nightscout data is private in this server.",
            who.display_name
        )),
        GlucoseError::PrivateData(None) => {
            FailureReply::Message("That Nightscout data is private.".to_string())
        }
        GlucoseError::InvalidArgument(reason) => {
            FailureReply::Message(format!("Invalid argument: {reason}"))
        }
        GlucoseError::RemoteStatus(401) => match owner {
            Some(owner) if ctx.is_invoker(owner.id) => FailureReply::Message(
                "Your Nightscout site requires a token. Set one so it can be read.".to_string(),
            ),
            Some(owner) => FailureReply::Message(format!(
                "{}'s Nightscout data could not be read because no valid token is set.",
                owner.display_name
            )),
            None => FailureReply::Message("That Nightscout site could not be read.".to_string()),
        },
        GlucoseError::RemoteStatus(code) => {
            warn!(
                status = code,
                invoker = ctx.invoker.id.0,
                "reply: remote endpoint returned error status"
            );
            FailureReply::Message("Could not connect to the Nightscout site.".to_string())
        }
        GlucoseError::NoRemoteData | GlucoseError::MalformedRemoteData => {
            debug!(code = err.code().as_str(), "reply: acknowledging transient failure");
            FailureReply::Acknowledge
        }
        GlucoseError::HostUnreachable => {
            warn!(invoker = ctx.invoker.id.0, "reply: remote host unreachable");
            FailureReply::Acknowledge
        }
        GlucoseError::Unexpected(cause) => {
            error!(invoker = ctx.invoker.id.0, %cause, "reply: unexpected failure");
            FailureReply::Acknowledge
        }
    }
}
