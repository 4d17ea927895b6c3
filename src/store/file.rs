use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CredentialStore, StoreError};

const STORE_FILE: &str = "credentials.json";

/// Credential store persisted as a JSON document under the data directory.
///
/// The whole map is held in memory and written through on every mutation.
/// Writes go to a sibling temp file first and are moved into place, so a
/// crash mid-write leaves the previous document intact.
pub struct FileCredentialStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileCredentialStore {
    /// Open (or create) the store under the given directory.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };

        debug!(path = %path.display(), "Opened credential store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LEGACY_TOKEN_KEY, LEGACY_USER_ID_KEY};

    #[test]
    fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileCredentialStore::open(dir.path()).unwrap();
            store.put(LEGACY_TOKEN_KEY, "tok-abc").unwrap();
            store.put(LEGACY_USER_ID_KEY, "u-42").unwrap();
        }

        let reopened = FileCredentialStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(LEGACY_TOKEN_KEY), Some("tok-abc".to_string()));
        assert_eq!(reopened.get(LEGACY_USER_ID_KEY), Some("u-42".to_string()));
    }

    #[test]
    fn clear_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileCredentialStore::open(dir.path()).unwrap();
            store.put(LEGACY_TOKEN_KEY, "tok-abc").unwrap();
            store.clear_legacy_artifacts().unwrap();
        }

        let reopened = FileCredentialStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(LEGACY_TOKEN_KEY), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORE_FILE), "not json").unwrap();
        assert!(matches!(
            FileCredentialStore::open(dir.path()),
            Err(StoreError::Corrupt(_))
        ));
    }
}
