//! Portcullis: session and route gating for a single-page admin console.
//!
//! Acquires and persists a bearer credential, resolves the signed-in
//! principal, gates routes by scope, and falls back to anonymous whenever the
//! backend rejects the credential. Browser facilities are reached through the
//! [`host`] traits, so the same state machine runs in a browser host, a test
//! harness, or the bundled CLI.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use portcullis::prelude::*;
//! use portcullis::host::{MemoryNavigator, MemoryStorage};
//!
//! # async fn example() -> portcullis::error::Result<()> {
//! let config = SessionConfig::from_env()?;
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
//! let transport = HttpSessionTransport::new(&config, TokenStore::new(storage.clone()))?;
//! let navigator = Arc::new(MemoryNavigator::at("/admin"));
//! let session = SessionManager::new(config.clone(), Arc::new(transport), storage, navigator);
//!
//! session.boot().await;
//! if session.login("ops@example.com", "correct horse").await {
//!     let routes = RouteTable::console(&config);
//!     let location = Location::parse("/admin")?;
//!     println!("{:?}", routes.resolve(&session.snapshot(), &location, None));
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod host;
pub mod prelude;
pub mod routing;
pub mod session;

#[cfg(feature = "cli")]
pub mod cli;
