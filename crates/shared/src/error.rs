use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unconfigured,
    NoConfiguredUrl,
    TooManyMentions,
    EveryoneMentioned,
    PrivateData,
    InvalidArgument,
    NoRemoteData,
    MalformedRemoteData,
    RemoteStatus,
    HostUnreachable,
    Unexpected,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Unconfigured => "unconfigured",
            ErrorCode::NoConfiguredUrl => "no_configured_url",
            ErrorCode::TooManyMentions => "too_many_mentions",
            ErrorCode::EveryoneMentioned => "everyone_mentioned",
            ErrorCode::PrivateData => "private_data",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::NoRemoteData => "no_remote_data",
            ErrorCode::MalformedRemoteData => "malformed_remote_data",
            ErrorCode::RemoteStatus => "remote_status",
            ErrorCode::HostUnreachable => "host_unreachable",
            ErrorCode::Unexpected => "unexpected",
        }
    }
}

/// Every failure a request can end in. Closed set; each value is final for
/// the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum GlucoseError {
    #[error("no endpoint configured for the invoker")]
    Unconfigured,
    #[error("no endpoint configured for {}", .0.display_name)]
    NoConfiguredUrl(Identity),
    #[error("more than one user mentioned")]
    TooManyMentions,
    #[error("everyone mentioned")]
    EveryoneMentioned,
    #[error("endpoint data is private")]
    PrivateData(Option<Identity>),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("remote endpoint returned no data")]
    NoRemoteData,
    #[error("remote endpoint returned malformed data")]
    MalformedRemoteData,
    #[error("remote endpoint responded with status {0}")]
    RemoteStatus(u16),
    #[error("remote host unreachable")]
    HostUnreachable,
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl GlucoseError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GlucoseError::Unconfigured => ErrorCode::Unconfigured,
            GlucoseError::NoConfiguredUrl(_) => ErrorCode::NoConfiguredUrl,
            GlucoseError::TooManyMentions => ErrorCode::TooManyMentions,
            GlucoseError::EveryoneMentioned => ErrorCode::EveryoneMentioned,
            GlucoseError::PrivateData(_) => ErrorCode::PrivateData,
            GlucoseError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            GlucoseError::NoRemoteData => ErrorCode::NoRemoteData,
            GlucoseError::MalformedRemoteData => ErrorCode::MalformedRemoteData,
            GlucoseError::RemoteStatus(_) => ErrorCode::RemoteStatus,
            GlucoseError::HostUnreachable => ErrorCode::HostUnreachable,
            GlucoseError::Unexpected(_) => ErrorCode::Unexpected,
        }
    }
}

/// Raw failure cause reported by a remote glucose service implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("resource not found")]
    NotFound,
    #[error("empty payload")]
    Empty,
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("host unreachable: {0}")]
    Unreachable(String),
    #[error("{0}")]
    Other(String),
}
