#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use portcullis::auth::{
    AuthError, Credential, HttpSessionTransport, Principal, RedirectLedger, SessionTransport,
    TokenStore, TransportEvent, TransportEventSink, UserSettings,
};
use portcullis::config::SessionConfig;
use portcullis::host::{MemoryNavigator, MemoryStorage, Storage};
use portcullis::session::SessionManager;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_PREFIX: &str = "/api/v1";

pub fn principal_json(id: i64, email: &str, scopes: &[&str]) -> Value {
    json!({
        "id": id,
        "email": email,
        "name": null,
        "scopes": scopes,
        "is_active": true,
        "is_google_user": false,
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": null
    })
}

pub fn principal(id: i64, email: &str, scopes: &[&str]) -> Principal {
    Principal {
        id,
        email: email.to_string(),
        name: None,
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        is_active: true,
        is_external_identity: false,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        updated_at: None,
    }
}

pub fn config_for(server: &MockServer) -> SessionConfig {
    SessionConfig::new()
        .with_api_base_url(&format!("{}{API_PREFIX}", server.uri()))
        .expect("api base url")
}

pub fn api(path_suffix: &str) -> String {
    format!("{API_PREFIX}{path_suffix}")
}

/// Answer `GET /auth/me` for `token` with `body`.
pub async fn mount_me(server: &MockServer, token: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(api("/auth/me")))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_me_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(api("/auth/me")))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "detail": "Could not validate credentials"
        })))
        .mount(server)
        .await;
}

pub async fn mount_password_grant(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(api("/auth/login")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
}

/// A session over memory storage, a recording navigator, and the HTTP
/// transport pointed at `server`.
pub struct Harness {
    pub config: SessionConfig,
    pub storage: Arc<MemoryStorage>,
    pub store: TokenStore,
    pub ledger: RedirectLedger,
    pub transport: Arc<HttpSessionTransport>,
    pub navigator: Arc<MemoryNavigator>,
    pub session: SessionManager,
}

impl Harness {
    pub fn new(server: &MockServer, start: &str) -> Self {
        Self::with_storage(config_for(server), Arc::new(MemoryStorage::new()), start)
    }

    pub fn with_storage(config: SessionConfig, storage: Arc<MemoryStorage>, start: &str) -> Self {
        let shared: Arc<dyn Storage> = storage.clone();
        let transport = Arc::new(
            HttpSessionTransport::new(&config, TokenStore::new(shared.clone())).expect("transport"),
        );
        let navigator = Arc::new(MemoryNavigator::at(start));
        let session = SessionManager::new(
            config.clone(),
            transport.clone(),
            shared.clone(),
            navigator.clone(),
        );
        Self {
            config,
            store: TokenStore::new(shared.clone()),
            ledger: RedirectLedger::new(shared),
            storage,
            transport,
            navigator,
            session,
        }
    }
}

/// Transport whose password grants block until released, for ordering
/// concurrent logins deterministically.
#[derive(Default)]
pub struct ScriptedTransport {
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    principal_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    principals: Mutex<HashMap<String, Principal>>,
    sinks: Mutex<Vec<TransportEventSink>>,
    saved_settings: Mutex<Vec<UserSettings>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The grant for `password` issues `token-<password>` once `gate` fires.
    pub fn gate(&self, password: &str, gate: oneshot::Receiver<()>) {
        self.gates
            .lock()
            .expect("gates lock")
            .insert(password.to_string(), gate);
    }

    /// Validating `token` blocks until `gate` fires.
    pub fn gate_principal(&self, token: &str, gate: oneshot::Receiver<()>) {
        self.principal_gates
            .lock()
            .expect("principal gates lock")
            .insert(token.to_string(), gate);
    }

    pub fn principal_for(&self, token: &str, principal: Principal) {
        self.principals
            .lock()
            .expect("principals lock")
            .insert(token.to_string(), principal);
    }

    pub fn reject_current_credential(&self, endpoint: &str) {
        let sinks = self.sinks.lock().expect("sinks lock").clone();
        for sink in sinks {
            sink(TransportEvent::Unauthorized {
                endpoint: endpoint.to_string(),
            });
        }
    }

    pub fn saved_settings(&self) -> Vec<UserSettings> {
        self.saved_settings.lock().expect("settings lock").clone()
    }
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn password_login(&self, _email: &str, password: &str) -> Result<Credential, AuthError> {
        let gate = self.gates.lock().expect("gates lock").remove(password);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(Credential::new(format!("token-{password}")))
    }

    async fn fetch_principal(&self) -> Result<Principal, AuthError> {
        Err(AuthError::NotLoggedIn)
    }

    async fn fetch_principal_with(&self, credential: &Credential) -> Result<Principal, AuthError> {
        let gate = self
            .principal_gates
            .lock()
            .expect("principal gates lock")
            .remove(credential.expose());
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.principals
            .lock()
            .expect("principals lock")
            .get(credential.expose())
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }

    async fn load_settings_with(&self, _credential: &Credential) -> Result<UserSettings, AuthError> {
        Ok(UserSettings::new())
    }

    async fn save_settings(&self, settings: &UserSettings) -> Result<(), AuthError> {
        self.saved_settings
            .lock()
            .expect("settings lock")
            .push(settings.clone());
        Ok(())
    }

    fn authorization_url(&self, landing: &str, _requested_scope: Option<&str>) -> Result<Url, AuthError> {
        let mut url = Url::parse("https://idp.example.com/start")?;
        url.query_pairs_mut().append_pair("redirect_uri", landing);
        Ok(url)
    }

    fn subscribe(&self, sink: TransportEventSink) {
        self.sinks.lock().expect("sinks lock").push(sink);
    }
}
