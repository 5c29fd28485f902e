//! Install-time prefetch of the application shell into staging.

use appshell_net::{CacheMode, Fetcher, Request};
use appshell_store::StorageService;
use bytes::Bytes;
use tracing::{info, warn};

use crate::manifest::ResourceKey;
use crate::router::resource_url;
use crate::{WorkerError, STAGING_REGION};

/// Fetches the shell set into the staging region during install.
///
/// All-or-nothing: every shell resource must download successfully before
/// anything is written, and a failure deletes staging so no partial shell
/// outlives a failed install. The main cache is never touched, so other
/// instances keep serving while an install is in flight.
#[derive(Debug, Clone)]
pub struct ShellPrefetcher {
    origin: String,
    shell: Vec<ResourceKey>,
}

impl ShellPrefetcher {
    /// Create a prefetcher for one origin and shell set.
    pub fn new(origin: String, shell: Vec<ResourceKey>) -> Self {
        Self { origin, shell }
    }

    /// Fetch the whole shell into staging.
    pub async fn run(
        &self,
        storage: &dyn StorageService,
        fetcher: &dyn Fetcher,
    ) -> Result<(), WorkerError> {
        match self.fill_staging(storage, fetcher).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(cleanup) = storage.delete_region(STAGING_REGION).await {
                    warn!(error = %cleanup, "staging cleanup failed");
                }
                Err(err)
            }
        }
    }

    async fn fill_staging(
        &self,
        storage: &dyn StorageService,
        fetcher: &dyn Fetcher,
    ) -> Result<(), WorkerError> {
        storage.open(STAGING_REGION).await?;
        info!(count = self.shell.len(), "prefetching application shell");

        let mut fetched: Vec<(ResourceKey, Bytes)> = Vec::with_capacity(self.shell.len());
        for key in &self.shell {
            let url = resource_url(&self.origin, key)?;
            // Shell files must come off the wire, not a conditional cache.
            let request = Request::get(url).with_cache_mode(CacheMode::Reload);
            let response = match fetcher.fetch(&request).await {
                Ok(response) => response,
                Err(err) => {
                    return Err(WorkerError::PrefetchFailed {
                        key: key.to_string(),
                        reason: err.to_string(),
                    })
                }
            };
            if !response.is_success() {
                return Err(WorkerError::PrefetchFailed {
                    key: key.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            fetched.push((key.clone(), response.body));
        }

        for (key, body) in fetched {
            storage.put(STAGING_REGION, key.as_str(), body).await?;
        }
        Ok(())
    }
}
