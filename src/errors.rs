//! Client error types.
//!
//! Every failure the flow can produce maps to one [`ClientError`]
//! variant.  The UI binder is the only place these are swallowed: it logs
//! them and moves on.

use thiserror::Error;

/// Result alias used by every client in the crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the identity, credential, storage and submission
/// clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The identity provider rejected a call (bad password, unknown user,
    /// wrong confirmation code, expired refresh token, ...).
    #[error("{code}: {message}")]
    Provider { code: String, message: String },

    /// An object storage operation failed.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// No user session is cached locally.
    #[error("User not available")]
    NoSession,

    /// A storage operation ran before the credential bridge was refreshed.
    #[error("no storage credential; log in first")]
    NoCredential,

    /// The submission API could not be reached or answered garbage.
    #[error("network error: {message}")]
    Network { message: String },

    /// A caller-supplied argument is out of range.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Short, stable identifier for logs and metric labels.
    pub fn code(&self) -> &str {
        match self {
            ClientError::Provider { code, .. } => code,
            ClientError::Storage { .. } => "StorageError",
            ClientError::NoSession => "NoSession",
            ClientError::NoCredential => "NoCredential",
            ClientError::Network { .. } => "NetworkError",
            ClientError::InvalidArgument { .. } => "InvalidArgument",
            ClientError::Internal(_) => "InternalError",
        }
    }

    pub(crate) fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Provider {
            code: code.into(),
            message: message.into(),
        }
    }

    pub(crate) fn storage(message: impl std::fmt::Display) -> Self {
        ClientError::Storage {
            message: message.to_string(),
        }
    }

    pub(crate) fn network(message: impl std::fmt::Display) -> Self {
        ClientError::Network {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_code_passthrough() {
        let err = ClientError::provider("NotAuthorizedException", "Incorrect username or password.");
        assert_eq!(err.code(), "NotAuthorizedException");
        assert_eq!(
            err.to_string(),
            "NotAuthorizedException: Incorrect username or password."
        );
    }

    #[test]
    fn test_no_session_message() {
        assert_eq!(ClientError::NoSession.to_string(), "User not available");
        assert_eq!(ClientError::NoSession.code(), "NoSession");
    }

    #[test]
    fn test_internal_from_anyhow() {
        let err: ClientError = anyhow::anyhow!("boom").into();
        assert_eq!(err.code(), "InternalError");
    }
}
