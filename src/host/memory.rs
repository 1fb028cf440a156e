use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Location, Navigator, PageLoad, Storage};
use crate::auth::AuthError;

/// Process-local storage. Survives nothing but the process itself.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// A navigation performed through a [`MemoryNavigator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRecord {
    ReplaceState(Location),
    Route(String),
    FullPage { url: String, load: PageLoad },
}

/// Headless navigator that tracks the current location and records every
/// navigation, in order.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: Mutex<NavigatorState>,
}

#[derive(Debug)]
struct NavigatorState {
    current: Location,
    history: Vec<NavigationRecord>,
}

impl MemoryNavigator {
    pub fn new(current: Location) -> Self {
        Self {
            state: Mutex::new(NavigatorState {
                current,
                history: Vec::new(),
            }),
        }
    }

    /// Start at `location`, falling back to `/` if it cannot be parsed.
    pub fn at(location: &str) -> Self {
        Self::new(Location::parse(location).unwrap_or_else(|_| Location::new("/")))
    }

    pub fn history(&self) -> Vec<NavigationRecord> {
        self.lock().history.clone()
    }

    /// The most recent full-page navigation, if any.
    pub fn last_full_page(&self) -> Option<(String, PageLoad)> {
        self.lock().history.iter().rev().find_map(|record| match record {
            NavigationRecord::FullPage { url, load } => Some((url.clone(), *load)),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, NavigatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new(Location::new("/"))
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> Location {
        self.lock().current.clone()
    }

    fn replace_state(&self, location: Location) {
        let mut state = self.lock();
        state.current = location.clone();
        state.history.push(NavigationRecord::ReplaceState(location));
    }

    fn route(&self, path: &str) {
        let mut state = self.lock();
        if let Ok(location) = Location::parse(path) {
            state.current = location;
        }
        state.history.push(NavigationRecord::Route(path.to_string()));
    }

    fn full_page(&self, url: &str, load: PageLoad) {
        let mut state = self.lock();
        if let Ok(location) = Location::parse(url) {
            state.current = location;
        }
        state.history.push(NavigationRecord::FullPage {
            url: url.to_string(),
            load,
        });
    }
}
