use async_trait::async_trait;
use parking_lot::RwLock;

use super::KvStore;
use super::Session;
use crate::Result;
use crate::Snapshot;

/// In-process key-value store
///
/// Holds everything in one ordered map. Useful as a stand-in for the remote
/// store in tests and for dry runs of `sync`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { data: RwLock::new(data) }
    }

    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.data.write().insert(key.into(), value.into());
    }

    pub fn remove(
        &self,
        key: &str,
    ) -> Option<String> {
        self.data.write().remove(key)
    }

    /// Copy of the whole store
    pub fn snapshot(&self) -> Snapshot {
        self.data.read().clone()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn get_keys_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Snapshot> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        self.remove(key);
        Ok(())
    }

    async fn authenticate(
        &self,
        user: &str,
        _password: &str,
    ) -> Result<Session> {
        Ok(Session {
            token: format!("memory:{}", user),
        })
    }
}
