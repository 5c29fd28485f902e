//! Activation-time cache reconciliation.

use appshell_store::StorageService;
use tracing::{debug, error, info};

use crate::manifest::{Manifest, ManifestStore, ResourceKey};
use crate::{WorkerError, MAIN_REGION, MANIFEST_REGION, STAGING_REGION};

/// Diffs the main cache against the manifest and migrates staged entries.
///
/// Runs once per activation as a strict sequence: load the persisted
/// manifest, evict stale entries, merge staging, persist the current
/// manifest. The persisted record is only written after the main cache is
/// fully reconciled, so a partial run is never recorded as complete.
pub struct CacheReconciler<'a> {
    manifests: &'a ManifestStore,
}

impl<'a> CacheReconciler<'a> {
    /// Create a reconciler over the manifest store.
    pub fn new(manifests: &'a ManifestStore) -> Self {
        Self { manifests }
    }

    /// Run the reconciliation sequence.
    ///
    /// On any error the cache state is treated as unrecoverable: all three
    /// regions are wiped and the error is returned. Requests then fall
    /// through to the network until the next install/activate cycle
    /// repairs state.
    pub async fn run(&self, storage: &dyn StorageService) -> Result<(), WorkerError> {
        match self.reconcile(storage).await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!(error = %err, "reconciliation failed, wiping cache state");
                for region in [MAIN_REGION, STAGING_REGION, MANIFEST_REGION] {
                    if let Err(wipe) = storage.delete_region(region).await {
                        error!(region, error = %wipe, "region wipe failed");
                    }
                }
                Err(err)
            }
        }
    }

    async fn reconcile(&self, storage: &dyn StorageService) -> Result<(), WorkerError> {
        storage.open(MAIN_REGION).await?;
        storage.open(STAGING_REGION).await?;
        storage.open(MANIFEST_REGION).await?;

        match self.manifests.load_persisted(storage).await? {
            None => {
                // No record of what a previous worker left behind; the
                // main cache cannot be trusted, so start empty.
                info!("first activation, clearing main cache");
                storage.delete_region(MAIN_REGION).await?;
                storage.open(MAIN_REGION).await?;
            }
            Some(old) => self.evict_stale(storage, &old).await?,
        }

        self.merge_staging(storage).await?;
        self.manifests.save_persisted(storage).await?;
        Ok(())
    }

    /// Delete every main-cache entry that was removed from the build or
    /// whose fingerprint changed. Unchanged entries are left untouched and
    /// are never re-downloaded.
    async fn evict_stale(
        &self,
        storage: &dyn StorageService,
        old: &Manifest,
    ) -> Result<(), WorkerError> {
        let current = self.manifests.current();
        for key in storage.keys(MAIN_REGION).await? {
            let resource = ResourceKey::new(key.as_str());
            let stale = match current.fingerprint(&resource) {
                None => true,
                Some(now) => old.fingerprint(&resource) != Some(now),
            };
            if stale {
                debug!(key = %resource, "evicting stale entry");
                storage.delete(MAIN_REGION, &key).await?;
            }
        }
        Ok(())
    }

    /// Copy every staged entry into the main cache (shell files overwrite
    /// entries just revalidated, keeping them fresh), then drop staging.
    async fn merge_staging(&self, storage: &dyn StorageService) -> Result<(), WorkerError> {
        for key in storage.keys(STAGING_REGION).await? {
            if let Some(body) = storage.get(STAGING_REGION, &key).await? {
                storage.put(MAIN_REGION, &key, body).await?;
            }
        }
        storage.delete_region(STAGING_REGION).await?;
        Ok(())
    }
}
