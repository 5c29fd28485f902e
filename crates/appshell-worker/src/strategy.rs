//! Cache-first and online-first serving strategies.

use appshell_net::{Fetcher, Request, Response};
use appshell_store::StorageService;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tracing::{debug, trace, warn};

use crate::manifest::ResourceKey;
use crate::{WorkerError, MAIN_REGION};

/// A response served to a controlled client.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    /// HTTP status code.
    pub status: StatusCode,

    /// Response headers (empty when served from cache).
    pub headers: HeaderMap,

    /// Response body.
    pub body: Bytes,

    /// Whether the payload came from the main cache.
    pub from_cache: bool,
}

impl ServedResponse {
    /// Wrap a cached payload.
    pub fn from_cache(body: Bytes) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
            from_cache: true,
        }
    }

    /// Wrap a live network response.
    pub fn from_network(response: Response) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            from_cache: false,
        }
    }
}

/// Serve from the main cache, fetching live on a miss.
///
/// Successful (2xx) fetches are copied into the main cache. The write is
/// opportunistic: a storage failure is logged and the live response is
/// returned regardless. A network failure on a miss propagates untouched;
/// there is nothing cached to fall back to.
pub async fn cache_first(
    storage: &dyn StorageService,
    fetcher: &dyn Fetcher,
    key: &ResourceKey,
    request: &Request,
) -> Result<ServedResponse, WorkerError> {
    if let Some(body) = storage.get(MAIN_REGION, key.as_str()).await? {
        trace!(key = %key, "cache hit");
        return Ok(ServedResponse::from_cache(body));
    }

    debug!(key = %key, "cache miss, fetching");
    let response = fetcher.fetch(request).await?;
    if response.is_success() {
        if let Err(err) = storage
            .put(MAIN_REGION, key.as_str(), response.body.clone())
            .await
        {
            warn!(key = %key, error = %err, "cache write failed");
        }
    }
    Ok(ServedResponse::from_network(response))
}

/// Serve the latest network copy, falling back to cache when offline.
///
/// Every resolved fetch refreshes the cached entry, so the root document
/// tracks the deployed version whenever connectivity allows. A network
/// failure is absorbed only when a cached copy exists; otherwise the
/// original failure propagates.
pub async fn online_first(
    storage: &dyn StorageService,
    fetcher: &dyn Fetcher,
    key: &ResourceKey,
    request: &Request,
) -> Result<ServedResponse, WorkerError> {
    match fetcher.fetch(request).await {
        Ok(response) => {
            if let Err(err) = storage
                .put(MAIN_REGION, key.as_str(), response.body.clone())
                .await
            {
                warn!(key = %key, error = %err, "cache write failed");
            }
            Ok(ServedResponse::from_network(response))
        }
        Err(err) => match storage.get(MAIN_REGION, key.as_str()).await? {
            Some(body) => {
                debug!(key = %key, "network failed, serving cached copy");
                Ok(ServedResponse::from_cache(body))
            }
            None => Err(err.into()),
        },
    }
}
