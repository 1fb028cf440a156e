//! Credentials, their durable storage, and the backend calls that issue and
//! validate them.

pub mod completion;
pub mod credential;
pub mod error;
pub mod ledger;
pub mod principal;
pub mod store;
pub mod transport;
pub mod users;

pub use completion::{CompletionMarker, LoginStatus};
pub use credential::{Credential, TokenResponse};
pub use error::AuthError;
pub use ledger::{handoff_url, select_landing, Landing, PendingRedirect, RedirectLedger};
pub use principal::{Principal, UserSettings};
pub use store::TokenStore;
pub use transport::{
    begin_external_login, HttpSessionTransport, SessionTransport, TransportEvent,
    TransportEventSink,
};
pub use users::{NewUser, UserUpdate};
