use crate::model::ConnectionState;
use crate::remote::RemoteError;
use std::time::Duration;
use thiserror::Error;

/// Global error type for the bridge core.
///
/// Every failure is classified by the stage that raised it, never by
/// inspecting the remote service's message wording, so the mapping stays
/// stable if the remote changes its phrasing. Messages carry stage and
/// account identity context but never credentials.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller input malformed or missing. Never retried, surfaced immediately.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The referenced account identity is unknown to the remote service.
    #[error("account {0} not found")]
    NotFound(String),

    /// A bounded readiness wait elapsed without the account connecting.
    #[error(
        "account {account_id} did not connect within {waited:?} (last observed state: {last_state:?})"
    )]
    ConnectionTimeout {
        account_id: String,
        waited: Duration,
        last_state: ConnectionState,
    },

    /// The remote dependency rejected or failed a call.
    #[error("remote service failure during {stage}: {source}")]
    RemoteService {
        stage: &'static str,
        #[source]
        source: RemoteError,
    },

    /// Catch-all for failures not matching a known cause.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

/// The caller-facing classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    ConnectionTimeout,
    RemoteService,
    Unexpected,
}

impl Error {
    /// Wraps a remote failure with the stage it occurred in. A remote
    /// not-found is promoted to [`Error::NotFound`] so callers see one kind
    /// regardless of which stage noticed the missing account.
    pub fn remote(stage: &'static str, source: RemoteError) -> Self {
        match source {
            RemoteError::NotFound(id) => Error::NotFound(id),
            source => Error::RemoteService { stage, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ConnectionTimeout { .. } => ErrorKind::ConnectionTimeout,
            Error::RemoteService { .. } => ErrorKind::RemoteService,
            Error::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// A specialized Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_not_found_is_promoted() {
        let err = Error::remote("account fetch", RemoteError::NotFound("acct-1".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn remote_api_failure_keeps_stage_context() {
        let err = Error::remote(
            "deploy",
            RemoteError::Api {
                status: 503,
                message: "maintenance".into(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::RemoteService);
        assert!(err.to_string().contains("deploy"));
    }
}
