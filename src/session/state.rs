//! Session state, its transition function, and observable snapshots.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use strum::{Display, EnumString};
use tokio::sync::watch;

use crate::auth::{Credential, Principal, UserSettings};

/// Coarse session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Initial validation has not settled yet. Make no routing decision.
    Booting,
    Anonymous,
    Authenticated,
}

/// Why a session became anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignOutReason {
    /// The user logged out.
    Explicit,
    /// The backend rejected the credential on some call.
    Invalidated,
    /// A credential could not be validated while establishing a session.
    ValidationFailed,
    /// The identity provider authenticated the user but withheld access.
    AccessDenied,
}

/// Input to [`Session::apply`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    LoginStarted,
    LoginFinished,
    /// A credential was validated and its principal resolved.
    Established {
        credential: Credential,
        principal: Principal,
        settings: UserSettings,
    },
    /// A cached principal is available for display before validation.
    Hydrated { principal: Principal },
    SettingsSaved { settings: UserSettings },
    SignedOut { reason: SignOutReason },
    BootFinished,
}

/// The in-memory session.
///
/// `principal` is only ever set together with `credential`. The cached
/// principal read at boot lives in `hint` and never authorizes anything.
#[derive(Debug, Clone)]
pub struct Session {
    credential: Option<Credential>,
    principal: Option<Principal>,
    hint: Option<Principal>,
    settings: UserSettings,
    booting: bool,
    boot_started: bool,
    logins_in_flight: usize,
    /// Generation handed to the most recent credential under validation.
    establish_generation: u64,
    last_sign_out: Option<SignOutReason>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session that has not booted yet.
    pub fn new() -> Self {
        Self {
            credential: None,
            principal: None,
            hint: None,
            settings: UserSettings::new(),
            booting: true,
            boot_started: false,
            logins_in_flight: 0,
            establish_generation: 0,
            last_sign_out: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.booting {
            SessionState::Booting
        } else if self.credential.is_some() && self.principal.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    pub fn loading(&self) -> bool {
        self.booting || self.logins_in_flight > 0
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    /// Register a credential that has just arrived and is about to be
    /// validated. Only the newest generation may commit.
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.establish_generation += 1;
        self.establish_generation
    }

    pub(crate) fn is_latest_generation(&self, generation: u64) -> bool {
        generation == self.establish_generation
    }

    /// Claim the one-time boot. Returns `false` if boot already started.
    pub(crate) fn start_boot(&mut self) -> bool {
        !std::mem::replace(&mut self.boot_started, true)
    }

    pub fn apply(&mut self, event: SessionEvent) {
        let before = self.state();
        match event {
            SessionEvent::LoginStarted => self.logins_in_flight += 1,
            SessionEvent::LoginFinished => {
                self.logins_in_flight = self.logins_in_flight.saturating_sub(1);
            }
            SessionEvent::Established {
                credential,
                principal,
                settings,
            } => {
                self.credential = Some(credential);
                self.principal = Some(principal);
                self.settings = settings;
                self.hint = None;
                self.last_sign_out = None;
            }
            SessionEvent::Hydrated { principal } => {
                if self.credential.is_none() {
                    self.hint = Some(principal);
                }
            }
            SessionEvent::SettingsSaved { settings } => {
                if self.credential.is_some() {
                    self.settings = settings;
                }
            }
            SessionEvent::SignedOut { reason } => {
                self.credential = None;
                self.principal = None;
                self.hint = None;
                self.settings.clear();
                self.last_sign_out = Some(reason);
            }
            SessionEvent::BootFinished => self.booting = false,
        }
        let after = self.state();
        if before != after {
            tracing::debug!(from = %before, to = %after, "Session transition");
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            principal: self.principal.clone(),
            hint: self.hint.clone(),
            loading: self.loading(),
            last_sign_out: self.last_sign_out,
        }
    }
}

/// Point-in-time view of the session for guards and presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Validated principal; set only while authenticated.
    pub principal: Option<Principal>,
    /// Unvalidated cached principal, for display only.
    pub hint: Option<Principal>,
    pub loading: bool,
    pub last_sign_out: Option<SignOutReason>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Whether the validated principal carries `scope`.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.principal
            .as_ref()
            .is_some_and(|principal| principal.has_scope(scope))
    }

    /// The principal to show in the UI, validated or not.
    pub fn display_principal(&self) -> Option<&Principal> {
        self.principal.as_ref().or(self.hint.as_ref())
    }
}

/// Shared owner of the [`Session`] that publishes a snapshot after every
/// mutation.
#[derive(Debug)]
pub(crate) struct SessionCell {
    session: Mutex<Session>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionCell {
    pub(crate) fn new() -> Self {
        let session = Session::new();
        let (snapshot_tx, _) = watch::channel(session.snapshot());
        Self {
            session: Mutex::new(session),
            snapshot_tx,
        }
    }

    /// Run `f` under the session lock, then publish the resulting snapshot.
    pub(crate) fn transact<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.lock();
        let result = f(&mut session);
        self.snapshot_tx.send_replace(session.snapshot());
        result
    }

    pub(crate) fn apply(&self, event: SessionEvent) -> SessionSnapshot {
        self.transact(|session| {
            session.apply(event);
            session.snapshot()
        })
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
