//! Network operations that exchange and validate credentials.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::credential::{Credential, TokenResponse};
use super::error::AuthError;
use super::principal::{Principal, UserSettings};
use super::store::TokenStore;
use crate::config::SessionConfig;
use crate::host::{Navigator, PageLoad};

/// Side effects the transport reports to whoever owns the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A request was answered with 401. The Token Store has already been
    /// cleared when this is delivered.
    Unauthorized { endpoint: String },
}

/// Callback for transport events.
pub type TransportEventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Backend operations the session layer depends on.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Exchange an email and password for a credential.
    async fn password_login(&self, email: &str, password: &str) -> Result<Credential, AuthError>;

    /// Resolve the principal behind the stored credential.
    async fn fetch_principal(&self) -> Result<Principal, AuthError>;

    /// Resolve the principal behind `credential` without reading the store.
    async fn fetch_principal_with(&self, credential: &Credential) -> Result<Principal, AuthError>;

    /// Load the settings document of the user behind `credential`.
    async fn load_settings_with(&self, credential: &Credential) -> Result<UserSettings, AuthError>;

    /// Replace the settings document of the signed-in user.
    async fn save_settings(&self, settings: &UserSettings) -> Result<(), AuthError>;

    /// The identity provider entry point for a login that returns to `landing`.
    fn authorization_url(&self, landing: &str, requested_scope: Option<&str>) -> Result<Url, AuthError>;

    /// Register a sink for [`TransportEvent`]s.
    fn subscribe(&self, sink: TransportEventSink);
}

/// Leave the application for the identity provider.
///
/// Nothing in memory survives this call; anything that must outlive the
/// round trip belongs in the [`RedirectLedger`](super::RedirectLedger).
pub fn begin_external_login(
    transport: &dyn SessionTransport,
    navigator: &dyn Navigator,
    landing: &str,
    requested_scope: Option<&str>,
) -> Result<(), AuthError> {
    let url = transport.authorization_url(landing, requested_scope)?;
    tracing::info!(provider = %url.origin().ascii_serialization(), "Starting external login");
    navigator.full_page(url.as_str(), PageLoad::Assign);
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct SettingsEnvelope {
    #[serde(default)]
    data: UserSettings,
}

/// `reqwest` implementation of [`SessionTransport`].
///
/// Every request carries the stored credential as a bearer header. Any 401
/// (other than from the password grant, where it means bad credentials)
/// clears the Token Store and notifies subscribers.
pub struct HttpSessionTransport {
    pub(super) client: reqwest::Client,
    pub(super) api_base_url: String,
    external_login_url: String,
    store: TokenStore,
    sinks: Mutex<Vec<TransportEventSink>>,
}

impl HttpSessionTransport {
    pub fn new(config: &SessionConfig, store: TokenStore) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url().to_string(),
            external_login_url: config.external_login_url(),
            store,
            sinks: Mutex::new(Vec::new()),
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    pub(super) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }

    /// Attach `credential`, or the stored one when `None`.
    pub(super) fn authorized(
        &self,
        builder: RequestBuilder,
        credential: Option<&Credential>,
    ) -> Result<RequestBuilder, AuthError> {
        let stored;
        let credential = match credential {
            Some(credential) => Some(credential),
            None => {
                stored = self.store.read()?;
                stored.as_ref()
            }
        };
        Ok(match credential {
            Some(credential) => builder.header("Authorization", credential.bearer()),
            None => builder,
        })
    }

    /// Send an authenticated request, applying the 401 interceptor.
    pub(super) async fn dispatch(
        &self,
        path: &str,
        builder: RequestBuilder,
        credential: Option<&Credential>,
    ) -> Result<Response, AuthError> {
        let response = self.authorized(builder, credential)?.send().await?;
        tracing::debug!(endpoint = path, status = response.status().as_u16(), "Backend response");
        if response.status() == StatusCode::UNAUTHORIZED {
            self.invalidate(path);
            return Err(AuthError::Unauthorized);
        }
        Ok(response)
    }

    fn invalidate(&self, endpoint: &str) {
        tracing::warn!(endpoint, "Credential rejected, clearing session");
        if let Err(err) = self.store.clear_all() {
            tracing::warn!(error = %err, "Failed to clear token store");
        }
        let sinks = self
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for sink in sinks {
            sink(TransportEvent::Unauthorized {
                endpoint: endpoint.to_string(),
            });
        }
    }

    async fn principal(&self, credential: Option<&Credential>) -> Result<Principal, AuthError> {
        let path = "/auth/me";
        let response = self
            .dispatch(path, self.client.get(self.endpoint(path)), credential)
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::Transport(format!(
                "{path} failed with status {status}: {}",
                error_detail(response).await
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SessionTransport for HttpSessionTransport {
    async fn password_login(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        let response = self
            .client
            .post(self.endpoint("/auth/login"))
            .header("Accept", "application/json")
            .form(&[("username", email), ("password", password)])
            .send()
            .await?;
        let status = response.status();
        tracing::debug!(endpoint = "/auth/login", status = status.as_u16(), "Backend response");
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(AuthError::InvalidCredentials(error_detail(response).await))
            }
            status if !status.is_success() => Err(AuthError::Transport(format!(
                "Login failed with status {status}: {}",
                error_detail(response).await
            ))),
            _ => {
                let token: TokenResponse = response.json().await?;
                if !token.token_type.eq_ignore_ascii_case("bearer") {
                    return Err(AuthError::InvalidResponse(format!(
                        "Unsupported token type '{}'",
                        token.token_type
                    )));
                }
                Ok(token.access_token)
            }
        }
    }

    async fn fetch_principal(&self) -> Result<Principal, AuthError> {
        if self.store.read()?.is_none() {
            return Err(AuthError::NotLoggedIn);
        }
        self.principal(None).await
    }

    async fn fetch_principal_with(&self, credential: &Credential) -> Result<Principal, AuthError> {
        self.principal(Some(credential)).await
    }

    async fn load_settings_with(&self, credential: &Credential) -> Result<UserSettings, AuthError> {
        let path = "/cookies";
        let response = self
            .dispatch(path, self.client.get(self.endpoint(path)), Some(credential))
            .await?;
        let envelope: SettingsEnvelope = expect_success(response).await?.json().await?;
        Ok(envelope.data)
    }

    async fn save_settings(&self, settings: &UserSettings) -> Result<(), AuthError> {
        let path = "/cookies";
        let body = SettingsEnvelope {
            data: settings.clone(),
        };
        let response = self
            .dispatch(path, self.client.post(self.endpoint(path)).json(&body), None)
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    fn authorization_url(&self, landing: &str, requested_scope: Option<&str>) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.external_login_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("redirect_uri", landing);
            if let Some(scope) = requested_scope.filter(|scope| !scope.is_empty()) {
                query.append_pair("client_scope", scope);
            }
        }
        Ok(url)
    }

    fn subscribe(&self, sink: TransportEventSink) {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }
}

impl std::fmt::Debug for HttpSessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSessionTransport")
            .field("api_base_url", &self.api_base_url)
            .field("external_login_url", &self.external_login_url)
            .finish_non_exhaustive()
    }
}

/// Map a non-success data-call response to [`AuthError::Api`].
pub(super) async fn expect_success(response: Response) -> Result<Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    Err(AuthError::Api {
        status,
        message: error_detail(response).await,
    })
}

/// The backend's `detail` explanation, falling back to the raw body.
async fn error_detail(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body,
        },
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        _ => body,
    }
}
