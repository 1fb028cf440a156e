//! The session state machine: boot, login, logout, and forced invalidation.

pub mod state;

pub use state::{Session, SessionEvent, SessionSnapshot, SessionState, SignOutReason};

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::auth::{
    self, handoff_url, select_landing, AuthError, CompletionMarker, Credential, Landing,
    Principal, RedirectLedger, SessionTransport, TokenStore, TransportEvent, TransportEventSink,
    UserSettings,
};
use crate::config::SessionConfig;
use crate::host::{encode_component, Navigator, PageLoad, Storage};
use state::SessionCell;

/// How a [`SessionManager::boot`] settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BootOutcome {
    /// A credential was validated. `landing` is the in-app route navigated
    /// to, if any.
    Authenticated { landing: Option<String> },
    Anonymous { redirected_to_login: bool },
    /// The identity provider withheld access; the forbidden page is shown.
    AccessDenied { required_scope: Option<String> },
    /// The credential was handed to a third-party caller by a full-page
    /// navigation to `target` (shown here without the credential).
    HandedOff { target: String },
}

#[derive(Debug, Clone)]
enum CredentialSource {
    Url { redirect_param: Option<String> },
    Storage,
    Login,
}

/// Where an established session went next.
enum Arrival {
    Stay,
    Routed(String),
    HandedOff(String),
}

/// Owns the session and drives every transition.
///
/// All methods take `&self`; the session lives behind a mutex and every
/// change is published as a [`SessionSnapshot`] to receivers obtained from
/// [`subscribe`](Self::subscribe).
pub struct SessionManager {
    config: SessionConfig,
    transport: Arc<dyn SessionTransport>,
    store: TokenStore,
    ledger: RedirectLedger,
    navigator: Arc<dyn Navigator>,
    cell: Arc<SessionCell>,
}

impl SessionManager {
    /// Wire the session to its host. `storage` must be the same storage the
    /// transport's Token Store writes to.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn SessionTransport>,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let cell = Arc::new(SessionCell::new());
        transport.subscribe(invalidation_sink(
            cell.clone(),
            navigator.clone(),
            config.login_path().to_string(),
        ));
        Self {
            config,
            transport,
            store: TokenStore::new(storage.clone()),
            ledger: RedirectLedger::new(storage),
            navigator,
            cell,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.cell.subscribe()
    }

    pub fn settings(&self) -> UserSettings {
        self.cell.read(|session| session.settings().clone())
    }

    /// Settle the initial session. Runs once; later calls report the
    /// current state without doing anything.
    ///
    /// Never fails: every problem ends in a definite [`BootOutcome`].
    pub async fn boot(&self) -> BootOutcome {
        if !self.cell.transact(|session| session.start_boot()) {
            tracing::debug!("Boot already ran, ignoring");
            return self.current_outcome();
        }

        let location = self.navigator.current();
        let mut candidate = None;
        if let Some(marker) = CompletionMarker::detect(&location) {
            self.navigator.replace_state(CompletionMarker::strip(location));
            match marker {
                CompletionMarker::Denied {
                    required_scope,
                    reason,
                } => return self.finish_boot(self.deny_access(required_scope, reason)),
                CompletionMarker::Issued {
                    credential,
                    redirect_param,
                } => candidate = Some((credential, CredentialSource::Url { redirect_param })),
            }
        }
        if candidate.is_none() {
            match self.store.read() {
                Ok(stored) => candidate = stored.map(|credential| (credential, CredentialSource::Storage)),
                Err(err) => tracing::warn!(error = %err, "Could not read stored credential"),
            }
        }

        let outcome = match candidate {
            Some((credential, source)) => self.boot_with(credential, source).await,
            None => {
                self.hydrate_hint();
                BootOutcome::Anonymous {
                    redirected_to_login: false,
                }
            }
        };
        self.finish_boot(outcome)
    }

    /// Password login that reports why it failed.
    ///
    /// Bad credentials and transport failures leave the session untouched.
    /// Concurrent logins are allowed; the one whose grant resolved last wins
    /// and earlier ones fail with [`AuthError::Superseded`].
    pub async fn try_login(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let _loading = LoginInFlight::start(&self.cell);
        let credential = self.transport.password_login(email, password).await?;
        let principal = self.establish(credential.clone()).await?;
        self.arrive(&credential, CredentialSource::Login);
        Ok(principal)
    }

    /// [`try_login`](Self::try_login) for callers that only need a yes/no.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        match self.try_login(email, password).await {
            Ok(_) => true,
            Err(err) => {
                tracing::info!(error = %err, "Login failed");
                false
            }
        }
    }

    /// Drop the session and its stored credential. Idempotent.
    pub fn logout(&self) {
        self.cell.transact(|session| {
            if let Err(err) = self.store.clear_all() {
                tracing::warn!(error = %err, "Failed to clear token store on logout");
            }
            session.apply(SessionEvent::SignedOut {
                reason: SignOutReason::Explicit,
            });
        });
        tracing::info!("Logged out");
    }

    /// Leave for the identity provider. When `client_redirect` is given the
    /// session is handed to that caller once the provider returns.
    pub fn begin_external_login(
        &self,
        client_redirect: Option<&str>,
        client_scope: Option<&str>,
    ) -> Result<(), AuthError> {
        match client_redirect {
            Some(target) => self.ledger.remember(target)?,
            None => self.ledger.clear()?,
        }
        auth::begin_external_login(
            self.transport.as_ref(),
            self.navigator.as_ref(),
            &self.config.app_root(),
            client_scope,
        )
    }

    /// Persist the signed-in user's settings document.
    pub async fn save_settings(&self, settings: UserSettings) -> Result<(), AuthError> {
        if !self.snapshot().is_authenticated() {
            return Err(AuthError::NotLoggedIn);
        }
        self.transport.save_settings(&settings).await?;
        self.cell.apply(SessionEvent::SettingsSaved { settings });
        Ok(())
    }

    fn current_outcome(&self) -> BootOutcome {
        if self.snapshot().is_authenticated() {
            BootOutcome::Authenticated { landing: None }
        } else {
            BootOutcome::Anonymous {
                redirected_to_login: false,
            }
        }
    }

    fn finish_boot(&self, outcome: BootOutcome) -> BootOutcome {
        self.cell.apply(SessionEvent::BootFinished);
        tracing::info!(?outcome, "Boot settled");
        outcome
    }

    fn deny_access(&self, required_scope: Option<String>, reason: Option<String>) -> BootOutcome {
        tracing::info!(?required_scope, ?reason, "External login denied access");
        self.cell.apply(SessionEvent::SignedOut {
            reason: SignOutReason::AccessDenied,
        });
        if let Err(err) = self.ledger.clear() {
            tracing::warn!(error = %err, "Failed to clear pending redirect");
        }
        self.navigator.route(self.config.forbidden_path());
        BootOutcome::AccessDenied { required_scope }
    }

    async fn boot_with(&self, credential: Credential, source: CredentialSource) -> BootOutcome {
        match self.establish(credential.clone()).await {
            Ok(_) => match self.arrive(&credential, source) {
                Arrival::Stay => BootOutcome::Authenticated { landing: None },
                Arrival::Routed(path) => BootOutcome::Authenticated {
                    landing: Some(path),
                },
                Arrival::HandedOff(target) => BootOutcome::HandedOff { target },
            },
            Err(AuthError::Superseded) => {
                tracing::debug!("Boot credential superseded by a login");
                self.current_outcome()
            }
            Err(err) => {
                tracing::warn!(error = %err, "Credential failed validation during boot");
                self.cell.transact(|session| {
                    if let Err(err) = self.store.clear_all() {
                        tracing::warn!(error = %err, "Failed to clear token store");
                    }
                    session.apply(SessionEvent::SignedOut {
                        reason: SignOutReason::ValidationFailed,
                    });
                });
                if let Err(err) = self.ledger.clear() {
                    tracing::warn!(error = %err, "Failed to clear pending redirect");
                }
                let must_redirect = matches!(source, CredentialSource::Url { .. })
                    || matches!(err, AuthError::Unauthorized);
                BootOutcome::Anonymous {
                    redirected_to_login: must_redirect
                        && redirect_to_login(self.navigator.as_ref(), self.config.login_path()),
                }
            }
        }
    }

    /// Validate `credential`, then commit it, its principal and settings in
    /// one step. Fails with [`AuthError::Superseded`] without touching the
    /// session or the store when a newer credential arrived meanwhile.
    async fn establish(&self, credential: Credential) -> Result<Principal, AuthError> {
        let generation = self.cell.transact(Session::next_generation);
        let principal = self.transport.fetch_principal_with(&credential).await?;
        let settings = match self.transport.load_settings_with(&credential).await {
            Ok(settings) => settings,
            Err(AuthError::Unauthorized) => return Err(AuthError::Unauthorized),
            Err(err) => {
                tracing::warn!(error = %err, "Could not load user settings");
                UserSettings::new()
            }
        };
        self.cell.transact(|session| {
            if !session.is_latest_generation(generation) {
                tracing::info!(user = %principal.email, "Discarding superseded login");
                return Err(AuthError::Superseded);
            }
            self.store.save(&credential)?;
            if let Err(err) = self.store.save_principal(&principal) {
                tracing::warn!(error = %err, "Could not cache principal");
            }
            session.apply(SessionEvent::Established {
                credential,
                principal: principal.clone(),
                settings,
            });
            Ok::<_, AuthError>(())
        })?;
        tracing::info!(user = %principal.email, "Session established");
        Ok(principal)
    }

    /// Resolve any pending redirect for a freshly established session.
    fn arrive(&self, credential: &Credential, source: CredentialSource) -> Arrival {
        let entry = self.ledger.consume().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Could not read pending redirect");
            None
        });
        let origin = self.config.app_origin();
        let landing = match source {
            CredentialSource::Url { redirect_param } => Some(select_landing(
                entry.as_ref(),
                redirect_param.as_deref(),
                self.config.default_route(),
                origin,
            )),
            CredentialSource::Storage | CredentialSource::Login => {
                entry.and_then(|entry| Landing::classify(&entry.target, origin))
            }
        };
        match landing {
            Some(Landing::External(target)) => {
                let url = handoff_url(&target, credential);
                tracing::info!(caller = %target.origin().ascii_serialization(), "Handing session to caller");
                self.navigator.full_page(url.as_str(), PageLoad::Assign);
                Arrival::HandedOff(target.to_string())
            }
            Some(Landing::InApp(path)) => {
                self.navigator.route(&path);
                Arrival::Routed(path)
            }
            None => Arrival::Stay,
        }
    }

    fn hydrate_hint(&self) {
        match self.store.read_principal() {
            Ok(Some(principal)) => {
                self.cell.apply(SessionEvent::Hydrated { principal });
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "Could not read cached principal"),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Marks the session as loading for the lifetime of one login attempt.
struct LoginInFlight<'a>(&'a SessionCell);

impl<'a> LoginInFlight<'a> {
    fn start(cell: &'a SessionCell) -> Self {
        cell.apply(SessionEvent::LoginStarted);
        Self(cell)
    }
}

impl Drop for LoginInFlight<'_> {
    fn drop(&mut self) {
        self.0.apply(SessionEvent::LoginFinished);
    }
}

/// Sign out on any rejected credential and send the user to the login page.
/// While booting only the sign-out happens; boot decides about navigation.
fn invalidation_sink(
    cell: Arc<SessionCell>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
) -> TransportEventSink {
    Arc::new(move |event| match event {
        TransportEvent::Unauthorized { endpoint } => {
            let snapshot = cell.apply(SessionEvent::SignedOut {
                reason: SignOutReason::Invalidated,
            });
            tracing::info!(endpoint, "Session invalidated by backend");
            if snapshot.state != SessionState::Booting {
                redirect_to_login(navigator.as_ref(), &login_path);
            }
        }
    })
}

/// Full-page replace to `{login_path}?redirect=<current path and query>`.
/// Does nothing when already on the login page.
fn redirect_to_login(navigator: &dyn Navigator, login_path: &str) -> bool {
    let current = navigator.current();
    if current.path == login_path {
        return false;
    }
    let url = format!(
        "{login_path}?redirect={}",
        encode_component(&current.path_and_query())
    );
    navigator.full_page(&url, PageLoad::Replace);
    true
}
