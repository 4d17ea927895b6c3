use parking_lot::RwLock;
use std::collections::HashMap;

use super::{CredentialStore, StoreError};

/// Process-local credential store. The default when no data directory is
/// configured, and the store of choice for tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_replaces_existing_value() {
        let store = MemoryCredentialStore::new();
        store.put("auth_token", "first").unwrap();
        store.put("auth_token", "second").unwrap();
        assert_eq!(store.get("auth_token"), Some("second".to_string()));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = MemoryCredentialStore::new();
        store.put("user_id", "u-1").unwrap();
        store.remove("user_id").unwrap();
        store.remove("user_id").unwrap();
        assert_eq!(store.get("user_id"), None);
    }
}
