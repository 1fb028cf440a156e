//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, Credential, HttpSessionTransport, Principal, RedirectLedger, SessionTransport,
    TokenStore, UserSettings,
};
pub use crate::config::SessionConfig;
pub use crate::error::{PortcullisError, Result};
pub use crate::host::{Location, Navigator, PageLoad, Storage};
pub use crate::routing::{GuardDecision, RouteGuard, RouteResolution, RouteTable};
pub use crate::session::{BootOutcome, SessionManager, SessionSnapshot, SessionState};
