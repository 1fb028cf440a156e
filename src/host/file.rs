use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Storage;
use crate::auth::AuthError;

const STORAGE_FILE_VERSION: u32 = 1;

/// File-backed storage: one TOML document per namespace.
///
/// Every write rewrites the whole document atomically, so a crash never leaves
/// a half-written credential behind.
///
/// # Example
/// ```no_run
/// use portcullis::host::{FileStorage, Storage};
///
/// let storage = FileStorage::new("/tmp/portcullis", "console");
/// storage.set("accessToken", "opaque")?;
/// # Ok::<(), portcullis::auth::AuthError>(())
/// ```
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(base_dir: impl Into<PathBuf>, namespace: &str) -> Self {
        let path = base_dir
            .into()
            .join(format!("{}.toml", file_stem_for(namespace)));
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn new_default(namespace: &str) -> Self {
        Self::new(default_storage_dir(), namespace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<StorageFile, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StorageFile::default())
            }
            Err(err) => return Err(AuthError::Storage(err.to_string())),
        };
        let document: StorageFile = toml::from_str(&raw)?;
        if document.version != STORAGE_FILE_VERSION {
            return Err(AuthError::Storage(format!(
                "Unsupported storage file version {} at {}",
                document.version,
                self.path.display()
            )));
        }
        Ok(document)
    }

    fn update(&self, edit: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.read_document().unwrap_or_else(|err| {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "Storage file is unreadable, starting a fresh one"
            );
            StorageFile::default()
        });
        edit(&mut document.entries);
        document.saved_at = Some(Utc::now());
        let serialized = toml::to_string(&document)?;
        replace_file(&self.path, serialized.as_bytes())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.read_document()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl Default for StorageFile {
    fn default() -> Self {
        Self {
            version: STORAGE_FILE_VERSION,
            saved_at: None,
            entries: BTreeMap::new(),
        }
    }
}

/// `~/.portcullis`, or `.portcullis` when no home directory is known.
pub fn default_storage_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".portcullis"))
        .unwrap_or_else(|| PathBuf::from(".portcullis"))
}

fn file_stem_for(namespace: &str) -> String {
    let stem: String = namespace
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if stem.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        stem
    }
}

/// Replace the storage file with `contents` by staging a private sibling
/// file and renaming it over `path`.
fn replace_file(path: &Path, contents: &[u8]) -> Result<(), AuthError> {
    let failed = |action: &str, err: std::io::Error| {
        AuthError::Storage(format!("Failed to {action} {}: {err}", path.display()))
    };

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|err| failed("create the directory for", err))?;
    }

    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let staging = path.with_extension(format!("toml.{}-{stamp}.partial", std::process::id()));
    if let Err(err) = write_private(&staging, contents).and_then(|()| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(failed("write", err));
    }
    Ok(())
}

/// Create `path` readable by the owner only and flush `contents` to disk.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
