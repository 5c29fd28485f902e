//! # AppShell Worker
//!
//! Offline app-shell caching engine for web applications.
//!
//! Sits between a controlled page's requests and the network: during
//! install it prefetches the application shell into a staging region,
//! during activation it reconciles the main cache against a versioned
//! resource manifest, and on every intercepted request it serves from
//! cache or network according to the resource's role.
//!
//! ## Features
//!
//! - **Lifecycle**: install, activate, fetch, and message signals
//! - **Reconciliation**: fingerprint diffing keeps unchanged assets cached
//!   across upgrades and purges stale ones
//! - **Routing**: manifest-gated interception, root served online-first,
//!   everything else cache-first
//! - **Offline fill**: on request, downloads every manifest resource not
//!   yet cached
//!
//! ## Architecture
//!
//! ```text
//! CacheWorker (install / activate / fetch / message)
//!     │
//!     ├── ShellPrefetcher   install: shell → STAGING
//!     ├── CacheReconciler   activate: evict, merge, persist
//!     ├── RequestRouter     fetch: classify and dispatch
//!     │       ├── cache-first   (manifest resources)
//!     │       └── online-first  (root document)
//!     └── ManifestStore     current + persisted manifest
//! ```

use appshell_net::FetchError;
use appshell_store::StoreError;
use thiserror::Error;

pub mod engine;
pub mod lifecycle;
pub mod manifest;
pub mod prefetch;
pub mod reconcile;
pub mod router;
pub mod strategy;

pub use engine::{CacheWorker, WorkerConfig};
pub use lifecycle::{HostMessage, WorkerEvent, WorkerState};
pub use manifest::{Fingerprint, Manifest, ManifestStore, ResourceKey};
pub use prefetch::ShellPrefetcher;
pub use reconcile::CacheReconciler;
pub use router::{resource_url, RequestRouter, RouteDecision};
pub use strategy::{cache_first, online_first, ServedResponse};

// ==================== Storage regions ====================

/// Long-lived region served to users.
pub const MAIN_REGION: &str = "appshell-cache";

/// Transient region filled during install, merged into [`MAIN_REGION`]
/// during activation.
pub const STAGING_REGION: &str = "appshell-temp-cache";

/// Region holding the single persisted manifest record.
pub const MANIFEST_REGION: &str = "appshell-manifest";

/// Record name of the persisted manifest inside [`MANIFEST_REGION`].
pub const MANIFEST_RECORD: &str = "manifest";

// ==================== Errors ====================

/// Errors raised by the cache engine.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Shell prefetch failed for '{key}': {reason}")]
    PrefetchFailed { key: String, reason: String },

    #[error("Offline download failed for '{key}': {reason}")]
    DownloadFailed { key: String, reason: String },

    #[error("Cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: WorkerState,
    },

    #[error("Persisted manifest record invalid: {0}")]
    ManifestInvalid(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}
