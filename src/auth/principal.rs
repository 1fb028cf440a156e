use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolved identity and authorization attributes of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Account provisioned through the external identity provider.
    #[serde(default, alias = "is_google_user")]
    pub is_external_identity: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Name for display, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

fn default_active() -> bool {
    true
}

/// Opaque per-user key-value document kept by the backend.
pub type UserSettings = serde_json::Map<String, serde_json::Value>;
