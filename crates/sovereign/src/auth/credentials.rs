//! Credential storage for the assistant backend.
//!
//! A small persistent key-value file. The API key lives under a fixed entry
//! and is only checked for shape here; the backend decides whether it is
//! actually valid (a rejected key comes back as a 401).

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entry under which the API key is stored.
pub const API_KEY_ENTRY: &str = "openai_key";

/// Every syntactically valid API key starts with this prefix.
pub const API_KEY_PREFIX: &str = "sk-";

/// Errors from reading, writing, or validating stored credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no API key is stored")]
    Missing,

    #[error("API key must start with 'sk-'")]
    InvalidFormat,

    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write credentials file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CredentialError {
    /// Whether the error means the user has to enter a key.
    pub fn is_entry_required(&self) -> bool {
        matches!(self, Self::Missing | Self::InvalidFormat)
    }
}

/// Check the shape of an API key, returning it trimmed.
pub fn validate_api_key(key: &str) -> Result<&str, CredentialError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(CredentialError::Missing);
    }
    if !key.starts_with(API_KEY_PREFIX) {
        return Err(CredentialError::InvalidFormat);
    }
    Ok(key)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Entries {
    #[serde(flatten)]
    values: BTreeMap<String, String>,
}

/// A persistent key-value store for credentials.
///
/// Persists to `~/.sovereign/credentials.json` unless another path is
/// configured. Every mutation is written through to disk immediately.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    entries: Entries,
}

impl CredentialStore {
    /// Default path for the credentials file.
    pub fn default_path() -> PathBuf {
        let home = match std::env::var("HOME") {
            Ok(h) => h,
            Err(_) => {
                tracing::warn!("HOME not set, using /tmp for credentials");
                "/tmp".to_string()
            }
        };
        PathBuf::from(home)
            .join(crate::config::DEFAULT_WORKSPACE)
            .join("credentials.json")
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    entries: Entries::default(),
                });
            }
            Err(source) => return Err(CredentialError::Read { path, source }),
        };
        let entries = match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(source) => return Err(CredentialError::Parse { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.entries
            .values
            .insert(key.to_string(), value.to_string());
        self.save()
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&mut self, key: &str) -> Result<bool, CredentialError> {
        let existed = self.entries.values.remove(key).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }

    /// The stored API key, if present and well-formed.
    pub fn api_key(&self) -> Result<String, CredentialError> {
        let stored = self.get(API_KEY_ENTRY).ok_or(CredentialError::Missing)?;
        validate_api_key(stored).map(str::to_string)
    }

    /// Validate and store an API key.
    pub fn set_api_key(&mut self, key: &str) -> Result<(), CredentialError> {
        let key = validate_api_key(key)?.to_string();
        self.set(API_KEY_ENTRY, &key)
    }

    /// Forget the stored API key. Returns whether one was stored.
    pub fn clear_api_key(&mut self) -> Result<bool, CredentialError> {
        self.remove(API_KEY_ENTRY)
    }

    /// Write the store to disk with restricted permissions.
    fn save(&self) -> Result<(), CredentialError> {
        let write_err = |source: std::io::Error| CredentialError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let contents = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .map_err(write_err)?;
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(contents.as_bytes()).map_err(write_err)?;
            let file = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
            file.sync_all().map_err(write_err)?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(&self.path, &contents).map_err(write_err)?;
        }

        tracing::debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }
}
