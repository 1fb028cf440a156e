use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

use super::credential::Credential;
use super::error::AuthError;
use crate::host::Storage;

const LEDGER_KEY: &str = "pendingRedirect";

/// Destination remembered across an external login round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRedirect {
    pub target: String,
    pub remembered_at: DateTime<Utc>,
}

/// Durable record of where a completed session should be handed off.
///
/// The page's memory is wiped while the user visits the identity provider,
/// so the intent is written to storage before leaving and read back exactly
/// once on return.
pub struct RedirectLedger {
    storage: Arc<dyn Storage>,
    consume_lock: Mutex<()>,
}

impl RedirectLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            consume_lock: Mutex::new(()),
        }
    }

    /// Persist `target`, replacing any previous entry.
    pub fn remember(&self, target: &str) -> Result<(), AuthError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(AuthError::InvalidUrl("empty redirect target".to_string()));
        }
        let entry = PendingRedirect {
            target: target.to_string(),
            remembered_at: Utc::now(),
        };
        self.storage.set(LEDGER_KEY, &serde_json::to_string(&entry)?)
    }

    /// Read the live entry without consuming it.
    pub fn peek(&self) -> Result<Option<PendingRedirect>, AuthError> {
        Ok(self.storage.get(LEDGER_KEY)?.and_then(|raw| decode(&raw)))
    }

    /// Read and clear the live entry. A second call returns `None`.
    pub fn consume(&self) -> Result<Option<PendingRedirect>, AuthError> {
        let _guard = self.consume_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(raw) = self.storage.get(LEDGER_KEY)? else {
            return Ok(None);
        };
        self.storage.remove(LEDGER_KEY)?;
        Ok(decode(&raw))
    }

    /// Discard the live entry, e.g. after a failed handoff.
    pub fn clear(&self) -> Result<(), AuthError> {
        self.storage.remove(LEDGER_KEY)
    }
}

fn decode(raw: &str) -> Option<PendingRedirect> {
    match serde_json::from_str(raw) {
        Ok(entry) => Some(entry),
        Err(err) => {
            tracing::warn!(error = %err, "Discarding unreadable pending redirect");
            None
        }
    }
}

/// Where an established session should go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    /// A route inside this application.
    InApp(String),
    /// A third-party caller that receives the credential by full-page handoff.
    External(Url),
}

impl Landing {
    /// Classify `target` against the application's origin
    /// (`scheme://host[:port]`).
    pub fn classify(target: &str, app_origin: &str) -> Option<Self> {
        if target.starts_with('/') && !target.starts_with("//") {
            return Some(Self::InApp(target.to_string()));
        }
        let url = Url::parse(target).ok()?;
        if url.origin().ascii_serialization() == app_origin.trim_end_matches('/') {
            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            Some(Self::InApp(path))
        } else {
            Some(Self::External(url))
        }
    }
}

/// Pick the landing after an external login completes.
///
/// The ledger entry was captured before the user left, so it wins over any
/// `redirect_uri` parameter present in the completion URL. The parameter alone
/// may only name an in-app route: a third-party landing requires a ledger
/// entry. With neither, the application's default route is used.
pub fn select_landing(
    ledger_entry: Option<&PendingRedirect>,
    url_param: Option<&str>,
    default_route: &str,
    app_origin: &str,
) -> Landing {
    if let Some(entry) = ledger_entry {
        match Landing::classify(&entry.target, app_origin) {
            Some(landing) => return landing,
            None => tracing::warn!(landing = %entry.target, "Ignoring unparseable pending redirect"),
        }
    }
    match url_param.and_then(|param| Landing::classify(param, app_origin)) {
        Some(Landing::InApp(path)) => Landing::InApp(path),
        Some(Landing::External(url)) => {
            tracing::warn!(landing = %url, "Ignoring third-party landing without a pending redirect");
            Landing::InApp(default_route.to_string())
        }
        None => Landing::InApp(default_route.to_string()),
    }
}

/// The URL that hands `credential` to an external caller, carried in the
/// fragment so it never reaches the caller's server logs.
pub fn handoff_url(target: &Url, credential: &Credential) -> Url {
    let fragment = form_urlencoded::Serializer::new(String::new())
        .append_pair("access_token", credential.expose())
        .append_pair("token_type", "bearer")
        .append_pair("login_status", "success")
        .finish();
    let mut url = target.clone();
    url.set_fragment(Some(&fragment));
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryStorage;

    fn app_origin() -> &'static str {
        "http://localhost:5173"
    }

    fn entry(target: &str) -> PendingRedirect {
        PendingRedirect {
            target: target.to_string(),
            remembered_at: Utc::now(),
        }
    }

    #[test]
    fn consume_is_read_once() {
        let ledger = RedirectLedger::new(Arc::new(MemoryStorage::new()));
        ledger.remember("https://reports.example.com/cb").unwrap();
        let first = ledger.consume().unwrap().unwrap();
        assert_eq!(first.target, "https://reports.example.com/cb");
        assert!(ledger.consume().unwrap().is_none());
    }

    #[test]
    fn remember_replaces_previous_entry() {
        let ledger = RedirectLedger::new(Arc::new(MemoryStorage::new()));
        ledger.remember("https://a.example.com").unwrap();
        ledger.remember("https://b.example.com").unwrap();
        assert_eq!(ledger.peek().unwrap().unwrap().target, "https://b.example.com");
    }

    #[test]
    fn remember_rejects_empty_target() {
        let ledger = RedirectLedger::new(Arc::new(MemoryStorage::new()));
        assert!(matches!(ledger.remember("  "), Err(AuthError::InvalidUrl(_))));
    }

    #[test]
    fn corrupt_entry_is_consumed_as_none() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(LEDGER_KEY, "garbage").unwrap();
        let ledger = RedirectLedger::new(storage.clone());
        assert!(ledger.consume().unwrap().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn ledger_wins_over_url_param() {
        let landing = select_landing(
            Some(&entry("https://reports.example.com/cb")),
            Some("https://evil.example.net/steal"),
            "/admin",
            app_origin(),
        );
        assert_eq!(
            landing,
            Landing::External(Url::parse("https://reports.example.com/cb").unwrap())
        );
    }

    #[test]
    fn url_param_used_without_ledger_entry() {
        let landing = select_landing(None, Some("/admin/users"), "/admin", app_origin());
        assert_eq!(landing, Landing::InApp("/admin/users".to_string()));
    }

    #[test]
    fn external_url_param_alone_falls_back_to_default_route() {
        let landing = select_landing(None, Some("https://evil.example.net/steal"), "/admin", app_origin());
        assert_eq!(landing, Landing::InApp("/admin".to_string()));
    }

    #[test]
    fn default_route_without_any_target() {
        let landing = select_landing(None, None, "/admin", app_origin());
        assert_eq!(landing, Landing::InApp("/admin".to_string()));
    }

    #[test]
    fn same_origin_absolute_url_is_in_app() {
        let landing = Landing::classify("http://localhost:5173/admin?tab=2", app_origin());
        assert_eq!(landing, Some(Landing::InApp("/admin?tab=2".to_string())));
    }

    #[test]
    fn protocol_relative_target_is_not_in_app() {
        assert_eq!(Landing::classify("//evil.example.net", app_origin()), None);
    }

    #[test]
    fn handoff_url_carries_credential_in_fragment() {
        let url = handoff_url(
            &Url::parse("https://reports.example.com/cb?x=1").unwrap(),
            &Credential::new("tok"),
        );
        assert_eq!(
            url.as_str(),
            "https://reports.example.com/cb?x=1#access_token=tok&token_type=bearer&login_status=success"
        );
    }
}
