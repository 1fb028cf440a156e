//! Route gating: map a session snapshot and a route's required scope to a
//! navigation decision.

pub mod routes;

pub use routes::{post_login_destination, LoginNotice, RouteResolution, RouteTable};

use serde::Serialize;

use crate::config::SessionConfig;
use crate::host::encode_component;
use crate::session::{SessionSnapshot, SessionState};

/// What to do with an attempted navigation to a protected route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// The session is still booting; show a neutral placeholder.
    Wait,
    Render,
    /// Anonymous. `from` is where to return after logging in.
    RedirectToLogin { from: String },
    /// Authenticated but missing `required_scope`.
    RedirectToForbidden { required_scope: String },
}

/// Pure decision function over [`SessionSnapshot`]s. Never touches the
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    login_path: String,
    forbidden_path: String,
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>, forbidden_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            forbidden_path: forbidden_path.into(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.login_path(), config.forbidden_path())
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn forbidden_path(&self) -> &str {
        &self.forbidden_path
    }

    pub fn decide(
        &self,
        snapshot: &SessionSnapshot,
        required_scope: Option<&str>,
        attempted: &str,
    ) -> GuardDecision {
        match snapshot.state {
            SessionState::Booting => GuardDecision::Wait,
            SessionState::Anonymous => GuardDecision::RedirectToLogin {
                from: attempted.to_string(),
            },
            SessionState::Authenticated => match required_scope {
                Some(scope) if !snapshot.has_scope(scope) => {
                    tracing::debug!(scope, attempted, "Missing scope for route");
                    GuardDecision::RedirectToForbidden {
                        required_scope: scope.to_string(),
                    }
                }
                _ => GuardDecision::Render,
            },
        }
    }

    /// The path a redirecting decision navigates to.
    pub fn redirect_target(&self, decision: &GuardDecision) -> Option<String> {
        match decision {
            GuardDecision::Wait | GuardDecision::Render => None,
            GuardDecision::RedirectToLogin { from } => Some(format!(
                "{}?redirect={}",
                self.login_path,
                encode_component(from)
            )),
            GuardDecision::RedirectToForbidden { .. } => Some(self.forbidden_path.clone()),
        }
    }
}
