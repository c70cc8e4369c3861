use shared::error::{FetchError, GlucoseError};

pub fn classify_fetch(cause: &FetchError) -> GlucoseError {
    match cause {
        FetchError::NotFound | FetchError::Empty => GlucoseError::NoRemoteData,
        FetchError::Malformed(_) => GlucoseError::MalformedRemoteData,
        FetchError::Status(code) => GlucoseError::RemoteStatus(*code),
        FetchError::Timeout | FetchError::Unreachable(_) => GlucoseError::HostUnreachable,
        FetchError::Other(cause) => GlucoseError::Unexpected(cause.clone()),
    }
}

/// Directory and preference stores failing is never the user's fault.
pub fn classify_directory(err: anyhow::Error) -> GlucoseError {
    GlucoseError::Unexpected(format!("{err:#}"))
}
