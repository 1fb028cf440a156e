//! Error types for Portcullis.

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for configuration, hosting and CLI operations.
///
/// Session operations report [`AuthError`]; it converts into this type when
/// crossing into host code.
#[derive(Error, Debug)]
pub enum PortcullisError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Forbidden: missing scope '{0}'")]
    Forbidden(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Network,
    Server,
    Api,
    Configuration,
    Storage,
    Serialization,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    Retry,
    SignInAgain,
    RequestAccess,
    CheckConfiguration,
    ContactSupport,
}

impl PortcullisError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Forbidden(_) => ErrorCategory::Authorization,
            Self::Network(_) => ErrorCategory::Network,
            Self::Configuration(_) | Self::InvalidArgument(_) => ErrorCategory::Configuration,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 => ErrorCategory::Authentication,
                403 => ErrorCategory::Authorization,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether repeating the same operation may succeed.
    ///
    /// Credential rejections are never retryable: the session is torn down
    /// and the user must sign in again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::SignInAgain,
            ErrorCategory::Authorization => RecoverySuggestion::RequestAccess,
            ErrorCategory::Network | ErrorCategory::Server => RecoverySuggestion::Retry,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

impl From<AuthError> for PortcullisError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Transport(message) => Self::Network(message),
            AuthError::ScopeDenied { required_scope } => Self::Forbidden(required_scope),
            AuthError::Storage(message) => Self::Io(std::io::Error::other(message)),
            AuthError::InvalidUrl(message) => Self::Configuration(message),
            AuthError::Api { status, message } => Self::Api { status, message },
            other @ (AuthError::InvalidCredentials(_)
            | AuthError::Unauthorized
            | AuthError::NotLoggedIn) => Self::Authentication(other.to_string()),
            other @ (AuthError::InvalidResponse(_)
            | AuthError::Serialization(_)
            | AuthError::Superseded) => {
                Self::InvalidState(other.to_string())
            }
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PortcullisError>;
