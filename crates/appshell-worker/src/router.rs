//! Request routing and resource key normalization.

use appshell_net::{FetchError, Request};
use http::Method;
use url::Url;

use crate::manifest::{Manifest, ResourceKey};

/// Dispatch decision for an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Not intercepted; the host's network stack handles it natively.
    PassThrough,
    /// Serve from the main cache, fetching live on miss.
    CacheFirst(ResourceKey),
    /// Fetch live, falling back to the main cache when offline.
    OnlineFirst(ResourceKey),
}

/// Serving origin rendered without a trailing slash, so prefix and
/// equality checks line up with incoming request URLs.
pub(crate) fn origin_str(origin: &Url) -> String {
    origin.as_str().trim_end_matches('/').to_string()
}

/// Build the absolute URL for a resource key under an origin.
pub fn resource_url(origin: &str, key: &ResourceKey) -> Result<Url, FetchError> {
    let raw = if key.is_root() {
        format!("{origin}/")
    } else {
        format!("{}/{}", origin, key.as_str())
    };
    Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))
}

/// Classifies intercepted requests against the current manifest.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    origin: String,
    root_fragment_prefix: String,
    manifest: Manifest,
}

impl RequestRouter {
    /// Create a router for one origin and manifest.
    pub fn new(origin: &Url, manifest: Manifest) -> Self {
        let origin = origin_str(origin);
        let root_fragment_prefix = format!("{origin}/#");
        Self {
            origin,
            root_fragment_prefix,
            manifest,
        }
    }

    /// Derive the normalized resource key for a URL.
    ///
    /// Returns `None` for URLs outside the serving origin. A `?v=` suffix
    /// is stripped (cache-busting tags are not part of identity), and the
    /// origin itself, the origin with a fragment, and an empty remainder
    /// all canonicalize to the root key.
    pub fn normalize(&self, url: &Url) -> Option<ResourceKey> {
        let url_str = url.as_str();
        let rest = url_str.strip_prefix(self.origin.as_str())?;
        let rest = rest.strip_prefix('/').unwrap_or(rest);

        let mut key = match rest.find("?v=") {
            Some(idx) => &rest[..idx],
            None => rest,
        };

        if url_str == self.origin
            || url_str.starts_with(&self.root_fragment_prefix)
            || key.is_empty()
        {
            key = "/";
        }

        Some(ResourceKey::new(key))
    }

    /// Decide how a request is served.
    ///
    /// Only GET requests against manifest resources are intercepted; the
    /// root document goes online-first, everything else cache-first.
    pub fn route(&self, request: &Request) -> RouteDecision {
        if request.method != Method::GET {
            return RouteDecision::PassThrough;
        }

        let Some(key) = self.normalize(&request.url) else {
            return RouteDecision::PassThrough;
        };

        if !self.manifest.contains(&key) {
            return RouteDecision::PassThrough;
        }

        if key.is_root() {
            RouteDecision::OnlineFirst(key)
        } else {
            RouteDecision::CacheFirst(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Fingerprint;

    fn router(origin: &str, keys: &[&str]) -> RequestRouter {
        let manifest: Manifest = keys
            .iter()
            .map(|k| (ResourceKey::from(*k), Fingerprint::from("h")))
            .collect();
        RequestRouter::new(&Url::parse(origin).unwrap(), manifest)
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_normalize_relative_path() {
        let r = router("https://app.example", &["/"]);
        let key = r.normalize(&Url::parse("https://app.example/main.js").unwrap());

        assert_eq!(key, Some(ResourceKey::from("main.js")));
    }

    #[test]
    fn test_normalize_nested_path() {
        let r = router("https://app.example", &["/"]);
        let key = r.normalize(&Url::parse("https://app.example/assets/logo.png").unwrap());

        assert_eq!(key, Some(ResourceKey::from("assets/logo.png")));
    }

    #[test]
    fn test_normalize_strips_version_tag() {
        let r = router("https://app.example", &["/"]);
        let key = r.normalize(&Url::parse("https://app.example/main.js?v=123").unwrap());

        assert_eq!(key, Some(ResourceKey::from("main.js")));
    }

    #[test]
    fn test_normalize_root_forms() {
        let r = router("https://app.example", &["/"]);
        for url in [
            "https://app.example/",
            "https://app.example/?v=123",
            "https://app.example/#/settings",
        ] {
            let key = r.normalize(&Url::parse(url).unwrap());
            assert_eq!(key, Some(ResourceKey::root()), "url: {url}");
        }
    }

    #[test]
    fn test_normalize_path_bearing_origin() {
        // An app served under a path: the versioned root request still
        // canonicalizes to the root key.
        let r = router("https://host.example/app", &["/"]);
        let key = r.normalize(&Url::parse("https://host.example/app?v=123").unwrap());

        assert_eq!(key, Some(ResourceKey::root()));
    }

    #[test]
    fn test_normalize_foreign_origin() {
        let r = router("https://app.example", &["/"]);
        let key = r.normalize(&Url::parse("https://cdn.example/lib.js").unwrap());

        assert_eq!(key, None);
    }

    #[test]
    fn test_route_non_get_passes_through() {
        let r = router("https://app.example", &["main.js"]);
        let mut request = get("https://app.example/main.js");
        request.method = Method::POST;

        assert_eq!(r.route(&request), RouteDecision::PassThrough);
    }

    #[test]
    fn test_route_unlisted_key_passes_through() {
        let r = router("https://app.example", &["main.js"]);

        // API calls and anything else off-manifest flow natively.
        assert_eq!(
            r.route(&get("https://app.example/api/items")),
            RouteDecision::PassThrough
        );
    }

    #[test]
    fn test_route_root_is_online_first() {
        let r = router("https://app.example", &["/", "main.js"]);

        assert_eq!(
            r.route(&get("https://app.example/")),
            RouteDecision::OnlineFirst(ResourceKey::root())
        );
    }

    #[test]
    fn test_route_resource_is_cache_first() {
        let r = router("https://app.example", &["/", "main.js"]);

        assert_eq!(
            r.route(&get("https://app.example/main.js")),
            RouteDecision::CacheFirst(ResourceKey::from("main.js"))
        );
    }

    #[test]
    fn test_resource_url_roundtrip() {
        let url = resource_url("https://app.example", &ResourceKey::from("a/b.js")).unwrap();
        assert_eq!(url.as_str(), "https://app.example/a/b.js");

        let root = resource_url("https://app.example", &ResourceKey::root()).unwrap();
        assert_eq!(root.as_str(), "https://app.example/");
    }
}
