//! Asynchronous key-value configuration store port.
//!
//! The running page never talks to its environment directly; everything it
//! persists or reads (target language, model id, enablement flags, the cache
//! blob, credentials) goes through this interface.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;

use crate::error::StoreError;

/// Namespace-scoped asynchronous get/set/remove storage.
///
/// The pipeline is single-threaded and cooperative, so implementations are
/// not required to be `Send`.
#[allow(async_fn_in_trait)]
pub trait ConfigStore {
    /// Fetches the requested keys. Absent keys are simply missing from the
    /// returned map, not errors.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Inserts or overwrites every entry in the mapping.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError>;

    /// Removes one key. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store used by tests and demos. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous peek for assertions.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.borrow().clone()
    }

    /// Synchronous insert for seeding test fixtures.
    pub fn seed(&self, key: &str, value: Value) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }
}

impl ConfigStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let entries = self.entries.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        self.entries.borrow_mut().extend(entries);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON file.
///
/// Every write rewrites the whole file; the stored state is small and
/// bounded (the cache blob is capacity-limited), so this stays cheap.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_all(&self) -> Result<HashMap<String, Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_all(&self, entries: &HashMap<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let entries = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let mut all = self.read_all().await?;
        all.extend(entries);
        self.write_all(&all).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut all = self.read_all().await?;
        if all.remove(key).is_some() {
            self.write_all(&all).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        store
            .set(entries(&[
                ("target_language", json!("Korean")),
                ("translation_enabled", json!(true)),
            ]))
            .await
            .expect("set should succeed");

        let values = store
            .get(&["target_language", "translation_enabled", "missing"])
            .await
            .expect("get should succeed");
        assert_eq!(values.len(), 2, "absent keys are omitted, not errors");
        assert_eq!(values["target_language"], json!("Korean"));

        store.remove("target_language").await.expect("remove should succeed");
        let values = store.get(&["target_language"]).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("store.json"));

        // Absent file reads as empty
        let values = store.get(&["anything"]).await.expect("get on absent file");
        assert!(values.is_empty());

        store
            .set(entries(&[("gpt_model", json!("gpt-4.1"))]))
            .await
            .expect("set should succeed");
        store
            .set(entries(&[("api_token", json!("sk-test"))]))
            .await
            .expect("second set should merge");

        let values = store.get(&["gpt_model", "api_token"]).await.unwrap();
        assert_eq!(values["gpt_model"], json!("gpt-4.1"));
        assert_eq!(values["api_token"], json!("sk-test"));

        store.remove("api_token").await.expect("remove should succeed");
        let values = store.get(&["api_token"]).await.unwrap();
        assert!(values.is_empty());
    }
}
