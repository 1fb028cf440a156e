use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque bearer credential proving an authenticated session.
///
/// The value is never interpreted locally: expiry is discovered only when the
/// backend rejects it. `Debug` output is redacted.
///
/// # Example
/// ```
/// use portcullis::auth::Credential;
///
/// let credential = Credential::new("eyJhbGciOi...");
/// assert_eq!(credential.bearer(), "Bearer eyJhbGciOi...");
/// assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Body of a successful password grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Credential,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}
