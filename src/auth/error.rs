use thiserror::Error;

/// Errors raised by the session layer and its transport.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The password grant was rejected. Carries the backend's explanation.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    /// The current credential was rejected by an authenticated call.
    #[error("Unauthorized")]
    Unauthorized,
    /// The backend could not be reached or failed unexpectedly.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Authenticated, but the principal lacks the scope a resource requires.
    #[error("Scope denied: '{required_scope}' is required")]
    ScopeDenied { required_scope: String },
    #[error("Not logged in")]
    NotLoggedIn,
    /// A newer login arrived while this one was still being validated.
    #[error("Login superseded by a newer one")]
    Superseded,
    /// The backend answered a data call with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Whether the failure leaves the session untouched so the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}
