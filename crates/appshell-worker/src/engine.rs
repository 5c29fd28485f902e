//! Engine tying host lifecycle signals to the cache components.

use std::sync::Arc;

use appshell_net::{Fetcher, Request};
use appshell_store::StorageService;
use bytes::Bytes;
use hashbrown::HashSet;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::lifecycle::{HostMessage, WorkerEvent, WorkerState};
use crate::manifest::{Manifest, ManifestStore, ResourceKey};
use crate::prefetch::ShellPrefetcher;
use crate::reconcile::CacheReconciler;
use crate::router::{origin_str, resource_url, RequestRouter, RouteDecision};
use crate::strategy::{cache_first, online_first, ServedResponse};
use crate::{WorkerError, MAIN_REGION};

/// Build-time constants the engine is constructed with.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Serving origin; requests outside it are never intercepted.
    pub origin: Url,

    /// Current build's resource manifest.
    pub manifest: Manifest,

    /// Application shell fetched during install, in order.
    pub shell: Vec<ResourceKey>,
}

/// The cache engine, driven by host lifecycle signals.
///
/// One instance corresponds to one deployed version: the manifest and
/// shell set are constant for its lifetime. Storage and network are
/// injected so hosts and tests choose their own backends.
pub struct CacheWorker {
    state: RwLock<WorkerState>,
    origin: String,
    manifests: ManifestStore,
    router: RequestRouter,
    prefetcher: ShellPrefetcher,
    storage: Arc<dyn StorageService>,
    fetcher: Arc<dyn Fetcher>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl CacheWorker {
    /// Create an engine and the receiver for its lifecycle events.
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn StorageService>,
        fetcher: Arc<dyn Fetcher>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let origin = origin_str(&config.origin);
        let router = RequestRouter::new(&config.origin, config.manifest.clone());
        let prefetcher = ShellPrefetcher::new(origin.clone(), config.shell);
        let manifests = ManifestStore::new(config.manifest);

        (
            Self {
                state: RwLock::new(WorkerState::Uninitialized),
                origin,
                manifests,
                router,
                prefetcher,
                storage,
                fetcher,
                event_tx,
            },
            event_rx,
        )
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn transition(&self, to: WorkerState) {
        let from = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, to)
        };
        debug!(?from, ?to, "lifecycle transition");
        let _ = self.event_tx.send(WorkerEvent::StateChange { from, to });
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Handle the host's install signal: prefetch the shell into staging.
    ///
    /// Failure of any shell fetch fails the whole install; the host
    /// retries per its own policy. Existing clients keep being served from
    /// the main cache throughout.
    pub async fn handle_install(&self) -> Result<(), WorkerError> {
        let state = self.state().await;
        if !matches!(state, WorkerState::Uninitialized | WorkerState::Failed) {
            return Err(WorkerError::InvalidState {
                operation: "install",
                state,
            });
        }

        self.transition(WorkerState::Installing).await;
        match self
            .prefetcher
            .run(self.storage.as_ref(), self.fetcher.as_ref())
            .await
        {
            Ok(()) => {
                self.transition(WorkerState::Installed).await;
                // Activate as soon as the host allows, without waiting for
                // old clients to wind down.
                self.emit(WorkerEvent::SkipWaiting);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "install failed");
                self.transition(WorkerState::Failed).await;
                Err(err)
            }
        }
    }

    /// Handle the host's activate signal: reconcile the caches against the
    /// manifest and take control of clients.
    pub async fn handle_activate(&self) -> Result<(), WorkerError> {
        let state = self.state().await;
        if !matches!(state, WorkerState::Installed | WorkerState::Ready) {
            return Err(WorkerError::InvalidState {
                operation: "activate",
                state,
            });
        }

        self.transition(WorkerState::Activating).await;
        let reconciler = CacheReconciler::new(&self.manifests);
        match reconciler.run(self.storage.as_ref()).await {
            Ok(()) => {
                self.transition(WorkerState::Ready).await;
                self.emit(WorkerEvent::Claimed);
                info!("activated");
                Ok(())
            }
            Err(err) => {
                self.transition(WorkerState::Failed).await;
                self.emit(WorkerEvent::ReconcileFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Handle an intercepted request.
    ///
    /// `Ok(None)` means the request is not intercepted and the host's
    /// network stack should handle it natively.
    pub async fn handle_fetch(
        &self,
        request: &Request,
    ) -> Result<Option<ServedResponse>, WorkerError> {
        match self.router.route(request) {
            RouteDecision::PassThrough => Ok(None),
            RouteDecision::OnlineFirst(key) => {
                online_first(self.storage.as_ref(), self.fetcher.as_ref(), &key, request)
                    .await
                    .map(Some)
            }
            RouteDecision::CacheFirst(key) => {
                cache_first(self.storage.as_ref(), self.fetcher.as_ref(), &key, request)
                    .await
                    .map(Some)
            }
        }
    }

    /// Handle a host message payload.
    pub async fn handle_message(&self, payload: &str) -> Result<(), WorkerError> {
        match HostMessage::parse(payload) {
            Some(HostMessage::SkipWaiting) => {
                debug!("skip waiting requested");
                self.emit(WorkerEvent::SkipWaiting);
                Ok(())
            }
            Some(HostMessage::DownloadOffline) => self.download_offline().await,
            None => {
                debug!(payload, "ignoring unrecognized message");
                Ok(())
            }
        }
    }

    /// Fetch every manifest resource not yet cached into the main region.
    ///
    /// Bulk add: every fetch must succeed before anything is written, and
    /// a single failure fails the whole operation.
    async fn download_offline(&self) -> Result<(), WorkerError> {
        let cached: HashSet<String> = self
            .storage
            .keys(MAIN_REGION)
            .await?
            .into_iter()
            .collect();
        let missing: Vec<&ResourceKey> = self
            .manifests
            .current()
            .keys()
            .filter(|key| !cached.contains(key.as_str()))
            .collect();

        if missing.is_empty() {
            debug!("offline download: nothing missing");
            return Ok(());
        }
        info!(count = missing.len(), "offline download");

        let mut fetched: Vec<(ResourceKey, Bytes)> = Vec::with_capacity(missing.len());
        for key in missing {
            let url = resource_url(&self.origin, key)?;
            let response = self.fetcher.fetch(&Request::get(url)).await?;
            if !response.is_success() {
                return Err(WorkerError::DownloadFailed {
                    key: key.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            fetched.push((key.clone(), response.body));
        }
        for (key, body) in fetched {
            self.storage.put(MAIN_REGION, key.as_str(), body).await?;
        }
        Ok(())
    }
}
