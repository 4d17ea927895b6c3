//! Credential artifact storage.
//!
//! Earlier clients kept a copy of the bearer token and user id in browser
//! local storage under well-known keys. This module replaces that with an
//! explicit keyed store: values are written on sign-in, read by whoever
//! needs a fallback credential, and purged when the backend rejects the
//! session. Nothing in here is ever treated as proof of a live session.

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::config::StorageConfig;

/// Key under which the bearer token artifact is stored
pub const LEGACY_TOKEN_KEY: &str = "auth_token";

/// Key under which the user id artifact is stored
pub const LEGACY_USER_ID_KEY: &str = "user_id";

/// Errors raised by credential store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access credential file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Keyed storage for credential artifacts with an explicit lifecycle:
/// written on sign-in, cleared on rejection or sign-out.
pub trait CredentialStore: Send + Sync {
    /// Read a stored artifact
    fn get(&self, key: &str) -> Option<String>;

    /// Write an artifact, replacing any previous value
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a single artifact. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Drop the token and user-id artifacts in one step. Used by the
    /// gateway when the backend answers 401.
    fn clear_legacy_artifacts(&self) -> Result<(), StoreError> {
        self.remove(LEGACY_TOKEN_KEY)?;
        self.remove(LEGACY_USER_ID_KEY)?;
        Ok(())
    }
}

/// Open the credential store described by the configuration.
///
/// A configured data directory selects the file-backed store; failure to
/// open it degrades to the in-memory store so the gateway keeps working
/// without persistence.
pub fn open_store(config: &StorageConfig) -> Arc<dyn CredentialStore> {
    match &config.data_dir {
        Some(dir) => match FileCredentialStore::open(dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    "Failed to open credential store in {}: {}. Falling back to in-memory storage.",
                    dir.display(),
                    e
                );
                Arc::new(MemoryCredentialStore::new())
            }
        },
        None => Arc::new(MemoryCredentialStore::new()),
    }
}
