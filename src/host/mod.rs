//! Host seams: durable key-value storage, the address bar, and page navigation.
//!
//! A browser host backs these with local storage and `window.location`; the
//! bundled implementations cover headless hosts and tests.

pub mod file;
pub mod memory;

pub use file::{default_storage_dir, FileStorage};
pub use memory::{MemoryNavigator, MemoryStorage, NavigationRecord};

use std::fmt;

use url::form_urlencoded;
use url::Url;

use crate::auth::AuthError;

/// Synchronous, process-local key-value persistence that survives reloads.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// How a full-page navigation treats the history entry it leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoad {
    /// Push a new entry (`location.assign`).
    Assign,
    /// Overwrite the current entry (`location.replace`).
    Replace,
}

/// Address-bar and navigation capabilities of the host.
pub trait Navigator: Send + Sync {
    /// The location currently shown in the address bar.
    fn current(&self) -> Location;
    /// Rewrite the visible URL without reloading or adding a history entry.
    fn replace_state(&self, location: Location);
    /// Move to another in-app route, replacing the current entry.
    fn route(&self, path: &str);
    /// Leave the application. In-memory state does not survive this call.
    fn full_page(&self, url: &str, load: PageLoad);
}

/// Path, query and fragment of an address-bar URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

const RELATIVE_BASE: &str = "http://portcullis.invalid/";

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: None,
            fragment: None,
        }
    }

    /// Parse an absolute URL or an origin-relative reference such as
    /// `/admin?tab=1#access_token=abc`.
    pub fn parse(input: &str) -> Result<Self, AuthError> {
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(RELATIVE_BASE)?.join(input)?,
            Err(err) => return Err(err.into()),
        };
        Ok(Self::from_url(&url))
    }

    pub fn from_url(url: &Url) -> Self {
        Self {
            path: url.path().to_string(),
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
            fragment: url.fragment().filter(|f| !f.is_empty()).map(str::to_string),
        }
    }

    /// `path?query`, the part a login redirect should bring the user back to.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        find_param(self.query.as_deref()?, name)
    }

    pub fn fragment_param(&self, name: &str) -> Option<String> {
        find_param(self.fragment.as_deref()?, name)
    }

    pub fn without_fragment(mut self) -> Self {
        self.fragment = None;
        self
    }

    /// Drop the named query parameters, keeping the rest in order.
    pub fn without_query_params(mut self, names: &[&str]) -> Self {
        let Some(query) = self.query.take() else {
            return self;
        };
        let kept: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| !names.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if !kept.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in &kept {
                serializer.append_pair(key, value);
            }
            self.query = Some(serializer.finish());
        }
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_and_query())?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

fn find_param(encoded: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(encoded.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Percent-encode a single query-parameter value.
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
