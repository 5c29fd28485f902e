//! # AppShell Store
//!
//! Named durable storage regions for the AppShell offline cache engine.
//!
//! ## Features
//!
//! - **StorageService**: injected async interface over named key/value regions
//! - **MemoryStorage**: in-memory implementation with entry-level atomicity
//! - **Region lifecycle**: create on open/put, delete wholesale, enumerate keys
//!
//! ## Architecture
//!
//! ```text
//! StorageService (trait)
//!     │
//!     └── MemoryStorage
//!             └── region name → { entry key → payload bytes }
//! ```
//!
//! Every operation is atomic at the entry level: a reader concurrent with a
//! writer sees either the previous payload or the new one, never a torn
//! intermediate. Callers that need failure injection substitute their own
//! [`StorageService`] implementation.

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::trace;

// ==================== Errors ====================

/// Errors raised by a storage backend.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Region unavailable: {0}")]
    RegionUnavailable(String),
}

// ==================== StorageService ====================

/// Abstract storage interface over named durable regions.
///
/// Regions are flat key/value byte stores. Operations on a region that does
/// not exist behave as if the region were empty (`get` returns `None`,
/// `keys` returns nothing, `delete` returns `false`); `open` and `put`
/// create the region.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensure a region exists, creating it empty if missing.
    async fn open(&self, region: &str) -> Result<(), StoreError>;

    /// Check whether a region exists.
    async fn contains_region(&self, region: &str) -> Result<bool, StoreError>;

    /// Delete a region and everything in it. Returns whether it existed.
    async fn delete_region(&self, region: &str) -> Result<bool, StoreError>;

    /// Read an entry's payload.
    async fn get(&self, region: &str, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write an entry, replacing any previous payload atomically.
    async fn put(&self, region: &str, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// Delete an entry. Returns whether it existed.
    async fn delete(&self, region: &str, key: &str) -> Result<bool, StoreError>;

    /// Enumerate the entry keys of a region.
    async fn keys(&self, region: &str) -> Result<Vec<String>, StoreError>;
}

// ==================== MemoryStorage ====================

/// In-memory [`StorageService`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    regions: RwLock<HashMap<String, HashMap<String, Bytes>>>,
}

impl MemoryStorage {
    /// Create empty storage with no regions.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn open(&self, region: &str) -> Result<(), StoreError> {
        let mut regions = self.regions.write().await;
        regions.entry(region.to_string()).or_default();
        Ok(())
    }

    async fn contains_region(&self, region: &str) -> Result<bool, StoreError> {
        Ok(self.regions.read().await.contains_key(region))
    }

    async fn delete_region(&self, region: &str) -> Result<bool, StoreError> {
        let removed = self.regions.write().await.remove(region).is_some();
        trace!(region, removed, "delete region");
        Ok(removed)
    }

    async fn get(&self, region: &str, key: &str) -> Result<Option<Bytes>, StoreError> {
        let regions = self.regions.read().await;
        Ok(regions.get(region).and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(&self, region: &str, key: &str, value: Bytes) -> Result<(), StoreError> {
        let mut regions = self.regions.write().await;
        regions
            .entry(region.to_string())
            .or_default()
            .insert(key.to_string(), value);
        trace!(region, key, "put entry");
        Ok(())
    }

    async fn delete(&self, region: &str, key: &str) -> Result<bool, StoreError> {
        let mut regions = self.regions.write().await;
        Ok(regions
            .get_mut(region)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn keys(&self, region: &str) -> Result<Vec<String>, StoreError> {
        let regions = self.regions.read().await;
        Ok(regions
            .get(region)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_region() {
        let storage = MemoryStorage::new();

        assert!(!storage.contains_region("main").await.unwrap());
        storage.open("main").await.unwrap();
        assert!(storage.contains_region("main").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let storage = MemoryStorage::new();

        storage
            .put("main", "a.js", Bytes::from_static(b"alert(1)"))
            .await
            .unwrap();

        let payload = storage.get("main", "a.js").await.unwrap();
        assert_eq!(payload, Some(Bytes::from_static(b"alert(1)")));
    }

    #[tokio::test]
    async fn test_put_creates_region_implicitly() {
        let storage = MemoryStorage::new();

        storage.put("temp", "x", Bytes::from_static(b"1")).await.unwrap();
        assert!(storage.contains_region("temp").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_replaces_payload() {
        let storage = MemoryStorage::new();

        storage.put("main", "a", Bytes::from_static(b"old")).await.unwrap();
        storage.put("main", "a", Bytes::from_static(b"new")).await.unwrap();

        assert_eq!(
            storage.get("main", "a").await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
    }

    #[tokio::test]
    async fn test_missing_region_behaves_empty() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.get("nope", "a").await.unwrap(), None);
        assert!(storage.keys("nope").await.unwrap().is_empty());
        assert!(!storage.delete("nope", "a").await.unwrap());
        assert!(!storage.delete_region("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let storage = MemoryStorage::new();

        storage.put("main", "a", Bytes::from_static(b"1")).await.unwrap();
        assert!(storage.delete("main", "a").await.unwrap());
        assert!(!storage.delete("main", "a").await.unwrap());
        assert_eq!(storage.get("main", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_region_removes_entries() {
        let storage = MemoryStorage::new();

        storage.put("temp", "a", Bytes::from_static(b"1")).await.unwrap();
        storage.put("temp", "b", Bytes::from_static(b"2")).await.unwrap();

        assert!(storage.delete_region("temp").await.unwrap());
        assert!(!storage.contains_region("temp").await.unwrap());
        assert_eq!(storage.get("temp", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_enumerates_region() {
        let storage = MemoryStorage::new();

        storage.put("main", "a.js", Bytes::from_static(b"1")).await.unwrap();
        storage.put("main", "b.js", Bytes::from_static(b"2")).await.unwrap();

        let mut keys = storage.keys("main").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a.js", "b.js"]);
    }
}
