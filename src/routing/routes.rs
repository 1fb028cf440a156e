//! The console's route table and login-page helpers.

use serde::Serialize;

use super::{GuardDecision, RouteGuard};
use crate::config::SessionConfig;
use crate::host::Location;
use crate::session::{SessionSnapshot, SessionState};

/// Scope required by the console's admin area.
pub const ADMIN_SCOPE: &str = "admin";

/// Result of resolving a navigation against a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum RouteResolution {
    Wait,
    Render { path: String },
    Redirect { to: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProtectedRoute {
    path: String,
    required_scope: Option<String>,
}

impl ProtectedRoute {
    fn matches(&self, path: &str) -> bool {
        path == self.path
            || path
                .strip_prefix(self.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Public pages, protected routes, the root redirect and the fallback.
#[derive(Debug, Clone)]
pub struct RouteTable {
    guard: RouteGuard,
    default_route: String,
    protected: Vec<ProtectedRoute>,
}

impl RouteTable {
    /// Login and forbidden pages only; add protected routes with
    /// [`protect`](Self::protect).
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            guard: RouteGuard::from_config(config),
            default_route: config.default_route().to_string(),
            protected: Vec::new(),
        }
    }

    /// The admin console: `/admin` requires the `admin` scope.
    pub fn console(config: &SessionConfig) -> Self {
        Self::new(config).protect("/admin", Some(ADMIN_SCOPE))
    }

    /// Gate `path` and everything below it behind a session, and optionally
    /// a scope.
    pub fn protect(mut self, path: impl Into<String>, required_scope: Option<&str>) -> Self {
        self.protected.push(ProtectedRoute {
            path: path.into(),
            required_scope: required_scope.map(str::to_string),
        });
        self
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// Resolve a navigation to `location`. `from_state` is the destination
    /// carried in router state by an earlier login redirect.
    pub fn resolve(
        &self,
        snapshot: &SessionSnapshot,
        location: &Location,
        from_state: Option<&str>,
    ) -> RouteResolution {
        let path = location.path.as_str();
        let render = || RouteResolution::Render {
            path: location.path_and_query(),
        };

        if path == self.guard.login_path() {
            return if snapshot.is_authenticated() {
                RouteResolution::Redirect {
                    to: post_login_destination(from_state, location, &self.default_route),
                }
            } else {
                render()
            };
        }
        if path == self.guard.forbidden_path() {
            return render();
        }
        if path == "/" {
            return match snapshot.state {
                SessionState::Booting => RouteResolution::Wait,
                SessionState::Authenticated => RouteResolution::Redirect {
                    to: self.default_route.clone(),
                },
                SessionState::Anonymous => RouteResolution::Redirect {
                    to: self.guard.login_path().to_string(),
                },
            };
        }

        let Some(route) = self.protected.iter().find(|route| route.matches(path)) else {
            return RouteResolution::Redirect { to: "/".to_string() };
        };
        let decision = self.guard.decide(
            snapshot,
            route.required_scope.as_deref(),
            &location.path_and_query(),
        );
        match self.guard.redirect_target(&decision) {
            Some(to) => RouteResolution::Redirect { to },
            None if decision == GuardDecision::Wait => RouteResolution::Wait,
            None => render(),
        }
    }
}

/// Where the login page sends the user once signed in: the router-state
/// origin, then the `redirect` query parameter, then the default route.
/// Only in-app paths are honoured.
pub fn post_login_destination(from_state: Option<&str>, location: &Location, default: &str) -> String {
    from_state
        .map(str::to_string)
        .filter(|path| is_in_app_path(path))
        .or_else(|| location.query_param("redirect").filter(|path| is_in_app_path(path)))
        .unwrap_or_else(|| default.to_string())
}

fn is_in_app_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}

/// Message the login page shows for query parameters left by a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum LoginNotice {
    AccessDenied { required_scope: Option<String> },
    LoggedOut,
}

impl LoginNotice {
    pub fn from_location(location: &Location) -> Option<Self> {
        let status = location.query_param("login_status");
        let reason = location.query_param("reason");
        if status.as_deref() == Some("access_denied") && reason.as_deref() == Some("scope_missing") {
            return Some(Self::AccessDenied {
                required_scope: location.query_param("required_scope"),
            });
        }
        location
            .query_param("logged_out")
            .map(|_| Self::LoggedOut)
    }

    pub fn message(&self) -> String {
        match self {
            Self::AccessDenied {
                required_scope: Some(scope),
            } => format!(
                "Access denied. You need the '{scope}' permission. Please contact the administrator."
            ),
            Self::AccessDenied { required_scope: None } => {
                "Access denied. Please contact the administrator.".to_string()
            }
            Self::LoggedOut => "You have been successfully logged out.".to_string(),
        }
    }
}
