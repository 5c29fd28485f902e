//! Resource manifest model and persistence.

use std::collections::BTreeMap;
use std::fmt;

use appshell_store::StorageService;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{WorkerError, MANIFEST_RECORD, MANIFEST_REGION};

/// Normalized path identifying a cacheable resource.
///
/// Keys are relative to the serving origin; the root document is the
/// sentinel `"/"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Sentinel key for the root document.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Create a key from an already-normalized path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Check if this is the root document key.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

/// Opaque content hash, compared only for equality and never decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a build-time hash string.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Fingerprint {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

/// Immutable resource → fingerprint mapping for one deployed version.
///
/// Ordered, and serialized as a flat JSON object so the persisted record
/// stays a plain key → fingerprint mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<ResourceKey, Fingerprint>,
}

impl Manifest {
    /// Check whether a key is part of this build.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Fingerprint recorded for a key.
    pub fn fingerprint(&self, key: &ResourceKey) -> Option<&Fingerprint> {
        self.entries.get(key)
    }

    /// Iterate the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.entries.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ResourceKey, Fingerprint)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (ResourceKey, Fingerprint)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Access to the current manifest and the previously-persisted one.
pub struct ManifestStore {
    current: Manifest,
}

impl ManifestStore {
    /// Wrap the build-time manifest.
    pub fn new(current: Manifest) -> Self {
        Self { current }
    }

    /// The build-time manifest; constant for the process lifetime.
    pub fn current(&self) -> &Manifest {
        &self.current
    }

    /// Read the manifest persisted by the last successful reconciliation.
    ///
    /// Absent on a first-ever run.
    pub async fn load_persisted(
        &self,
        storage: &dyn StorageService,
    ) -> Result<Option<Manifest>, WorkerError> {
        let Some(raw) = storage.get(MANIFEST_REGION, MANIFEST_RECORD).await? else {
            return Ok(None);
        };
        let manifest = serde_json::from_slice(&raw)
            .map_err(|e| WorkerError::ManifestInvalid(e.to_string()))?;
        Ok(Some(manifest))
    }

    /// Overwrite the persisted record with the current manifest.
    ///
    /// A single atomic put; only called after the main cache is fully
    /// reconciled.
    pub async fn save_persisted(
        &self,
        storage: &dyn StorageService,
    ) -> Result<(), WorkerError> {
        let raw = serde_json::to_vec(&self.current)
            .map_err(|e| WorkerError::ManifestInvalid(e.to_string()))?;
        storage
            .put(MANIFEST_REGION, MANIFEST_RECORD, raw.into())
            .await?;
        trace!(entries = self.current.len(), "persisted manifest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appshell_store::MemoryStorage;

    fn manifest(entries: &[(&str, &str)]) -> Manifest {
        entries
            .iter()
            .map(|(k, v)| (ResourceKey::from(*k), Fingerprint::from(*v)))
            .collect()
    }

    #[test]
    fn test_root_key() {
        assert!(ResourceKey::root().is_root());
        assert!(!ResourceKey::from("index.html").is_root());
        assert_eq!(ResourceKey::root().as_str(), "/");
    }

    #[test]
    fn test_fingerprint_equality_is_opaque() {
        // Same digits, different text: not equal. Never parsed as a number.
        assert_ne!(Fingerprint::from("00ff"), Fingerprint::from("00FF"));
        assert_eq!(Fingerprint::from("00ff"), Fingerprint::from("00ff"));
    }

    #[test]
    fn test_manifest_lookup() {
        let m = manifest(&[("a.js", "h1"), ("/", "h2")]);

        assert!(m.contains(&ResourceKey::from("a.js")));
        assert!(!m.contains(&ResourceKey::from("b.js")));
        assert_eq!(
            m.fingerprint(&ResourceKey::root()),
            Some(&Fingerprint::from("h2"))
        );
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_manifest_serializes_flat() {
        let m = manifest(&[("a.js", "h1"), ("b.js", "h2")]);
        let json = serde_json::to_string(&m).unwrap();

        assert_eq!(json, r#"{"a.js":"h1","b.js":"h2"}"#);

        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_manifest_keys_ordered() {
        let m = manifest(&[("b.js", "h2"), ("a.js", "h1"), ("/", "h0")]);
        let keys: Vec<&str> = m.keys().map(ResourceKey::as_str).collect();

        assert_eq!(keys, vec!["/", "a.js", "b.js"]);
    }

    #[tokio::test]
    async fn test_persist_roundtrip() {
        let storage = MemoryStorage::new();
        let store = ManifestStore::new(manifest(&[("a.js", "h1")]));

        assert!(store.load_persisted(&storage).await.unwrap().is_none());

        store.save_persisted(&storage).await.unwrap();
        let loaded = store.load_persisted(&storage).await.unwrap();

        assert_eq!(loaded.as_ref(), Some(store.current()));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let storage = MemoryStorage::new();
        storage
            .put(MANIFEST_REGION, MANIFEST_RECORD, "not json".into())
            .await
            .unwrap();

        let store = ManifestStore::new(Manifest::default());
        let result = store.load_persisted(&storage).await;

        assert!(matches!(result, Err(WorkerError::ManifestInvalid(_))));
    }
}
