use std::sync::Arc;

use super::credential::Credential;
use super::error::AuthError;
use super::principal::Principal;
use crate::host::Storage;

const CREDENTIAL_KEY: &str = "accessToken";
const PRINCIPAL_KEY: &str = "currentUser";

/// Durable home of the current credential and a best-effort principal cache.
///
/// The cached principal is an offline hint only; it is never trusted for an
/// authorization decision until the credential has been revalidated.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use portcullis::auth::{Credential, TokenStore};
/// use portcullis::host::MemoryStorage;
///
/// let store = TokenStore::new(Arc::new(MemoryStorage::new()));
/// store.save(&Credential::new("opaque"))?;
/// assert!(store.read()?.is_some());
/// store.clear_all()?;
/// assert!(store.read()?.is_none());
/// # Ok::<(), portcullis::auth::AuthError>(())
/// ```
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        self.storage.set(CREDENTIAL_KEY, credential.expose())
    }

    pub fn read(&self) -> Result<Option<Credential>, AuthError> {
        Ok(self
            .storage
            .get(CREDENTIAL_KEY)?
            .filter(|value| !value.trim().is_empty())
            .map(Credential::new))
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        self.storage.remove(CREDENTIAL_KEY)
    }

    pub fn save_principal(&self, principal: &Principal) -> Result<(), AuthError> {
        let blob = serde_json::to_string(principal)?;
        self.storage.set(PRINCIPAL_KEY, &blob)
    }

    /// The cached principal, or `None` when absent or unreadable.
    pub fn read_principal(&self) -> Result<Option<Principal>, AuthError> {
        let Some(blob) = self.storage.get(PRINCIPAL_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&blob) {
            Ok(principal) => Ok(Some(principal)),
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable cached principal");
                Ok(None)
            }
        }
    }

    pub fn clear_principal(&self) -> Result<(), AuthError> {
        self.storage.remove(PRINCIPAL_KEY)
    }

    /// Remove the credential and the principal cache.
    pub fn clear_all(&self) -> Result<(), AuthError> {
        let credential = self.clear();
        let principal = self.clear_principal();
        credential.and(principal)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}
