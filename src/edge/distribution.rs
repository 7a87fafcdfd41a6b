//! Edge distribution: the public entry point.
//!
//! # Data Flow
//! ```text
//! request → BindingSet::resolve(path)
//!         ├─ static:  method check → cache → asset store (key rewrite) → cache fill
//!         └─ dynamic: forward verbatim to the router, never cached
//! ```

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

use crate::assets::{AssetError, AssetStore};
use crate::compute::Upstream;
use crate::edge::binding::{BindingSet, OriginBinding, OriginKind};
use crate::edge::cache::{CacheKey, ResponseCache};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::PathPattern;

/// Header reporting whether a static response came from the cache.
pub const X_CACHE: &str = "x-cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheOutcome {
    Hit,
    Miss,
    Bypass,
}

impl CacheOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "Hit",
            CacheOutcome::Miss => "Miss",
            CacheOutcome::Bypass => "Bypass",
        }
    }
}

#[derive(Debug)]
pub struct EdgeDistribution {
    bindings: BindingSet,
    store: Arc<dyn AssetStore>,
    dynamic: Arc<dyn Upstream>,
    cache: Arc<ResponseCache>,
}

impl EdgeDistribution {
    pub fn new(bindings: BindingSet, store: Arc<dyn AssetStore>, dynamic: Arc<dyn Upstream>) -> Self {
        Self {
            bindings,
            store,
            dynamic,
            cache: Arc::new(ResponseCache::new()),
        }
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        self.cache.clone()
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    /// Drop cached responses whose path matches `pattern`.
    pub fn invalidate(&self, pattern: &PathPattern) -> usize {
        self.cache.invalidate(pattern)
    }

    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let binding = self.bindings.resolve(request.uri().path());

        let (response, outcome) = if !binding.allows(request.method()) {
            (method_not_allowed(binding), CacheOutcome::Bypass)
        } else {
            match binding.origin {
                OriginKind::Static => {
                    // Only the head is needed; the body is not held across the store read.
                    let (parts, _) = request.into_parts();
                    self.serve_static(binding, &parts).await
                }
                OriginKind::Dynamic => (self.forward_dynamic(request).await, CacheOutcome::Bypass),
            }
        };

        tracing::debug!(
            origin = binding.origin.as_str(),
            binding = %binding.pattern,
            cache = outcome.as_str(),
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Edge request served"
        );
        metrics::record_edge_request(
            binding.origin.as_str(),
            outcome.as_str(),
            response.status().as_u16(),
        );
        response
    }

    async fn forward_dynamic(&self, request: Request<Body>) -> Response<Body> {
        match self.dynamic.call(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Dynamic origin failed");
                e.into_response()
            }
        }
    }

    async fn serve_static(
        &self,
        binding: &OriginBinding,
        request: &Parts,
    ) -> (Response<Body>, CacheOutcome) {
        let head = request.method == Method::HEAD;

        let key = cache_key(binding, request);
        if binding.cacheable {
            if let Some(hit) = self.cache.get(&key) {
                let age = hit.age();
                let response = static_response(
                    hit.status,
                    &hit.content_type,
                    hit.body,
                    head,
                    CacheOutcome::Hit,
                    Some(age),
                );
                return (response, CacheOutcome::Hit);
            }
        }

        let store_key = binding.store_key(request.uri.path());
        let asset = match self.store.get(&store_key).await {
            Ok(asset) => asset,
            Err(AssetError::NotFound(_)) | Err(AssetError::InvalidKey(_)) => {
                return (response::not_found(), CacheOutcome::Miss);
            }
            Err(e) => {
                tracing::error!(key = %store_key, error = %e, "Asset store read failed");
                return (response::not_found(), CacheOutcome::Miss);
            }
        };

        let outcome = if binding.cacheable {
            self.cache.insert(
                key,
                StatusCode::OK,
                asset.content_type.clone(),
                asset.bytes.clone(),
                binding.ttl,
            );
            CacheOutcome::Miss
        } else {
            CacheOutcome::Bypass
        };

        let response = static_response(
            StatusCode::OK,
            &asset.content_type,
            asset.bytes.clone(),
            head,
            outcome,
            None,
        );
        (response, outcome)
    }
}

fn cache_key(binding: &OriginBinding, request: &Parts) -> CacheKey {
    let path_and_query = request
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri.path().to_string());
    let headers = binding
        .forwarded_headers
        .iter()
        .map(|name| {
            let value = request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            (name.as_str().to_string(), value.to_string())
        })
        .collect();
    CacheKey {
        binding: binding.pattern.as_str().to_string(),
        path_and_query,
        headers,
    }
}

fn static_response(
    status: StatusCode,
    content_type: &str,
    body: Bytes,
    head: bool,
    outcome: CacheOutcome,
    age: Option<u64>,
) -> Response<Body> {
    let length = body.len();
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length)
        .header(X_CACHE, outcome.as_str());
    if let Some(age) = age {
        builder = builder.header(header::AGE, age);
    }
    let body = if head { Body::empty() } else { Body::from(body) };
    builder
        .body(body)
        .unwrap_or_else(|_| response::text_response(StatusCode::INTERNAL_SERVER_ERROR, "invalid response"))
}

fn method_not_allowed(binding: &OriginBinding) -> Response<Body> {
    let allow = binding
        .allowed_methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut response = response::text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetPublisher, AssetTree, MemoryAssetStore, PublishOptions};
    use crate::compute::{FnTarget, UpstreamError, UpstreamFuture};
    use std::time::Duration;

    #[derive(Debug)]
    struct Unreachable;

    impl Upstream for Unreachable {
        fn call(&self, _request: Request<Body>) -> UpstreamFuture<'_> {
            Box::pin(async { Err(UpstreamError::Unreachable("connection refused".into())) })
        }
    }

    fn echo_router() -> Arc<dyn Upstream> {
        Arc::new(FnTarget::new("router", |req: Request<Body>| async move {
            response::text_response(StatusCode::OK, format!("router saw {}", req.uri().path()))
        }))
    }

    fn edge(store: Arc<MemoryAssetStore>, ttl_secs: u64) -> EdgeDistribution {
        EdgeDistribution::new(
            BindingSet::reference(Duration::from_secs(ttl_secs)),
            store,
            echo_router(),
        )
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_of(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn publish(store: &Arc<MemoryAssetStore>, file: &str, contents: &str) {
        let mut tree = AssetTree::new();
        tree.insert(file.to_string(), Bytes::from(contents.to_string()));
        AssetPublisher::new(store.clone(), "home")
            .publish(tree, "_next/static", PublishOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_republished_asset_visible_after_ttl() {
        let store = Arc::new(MemoryAssetStore::new());
        let edge = edge(store.clone(), 60);
        publish(&store, "app.js", "v1").await;

        let first = edge.handle(get("/_next/static/app.js")).await;
        assert_eq!(first.headers()[X_CACHE], "Miss");
        assert_eq!(body_of(first).await, "v1");

        publish(&store, "app.js", "v2").await;
        tokio::time::advance(Duration::from_secs(30)).await;
        let stale = edge.handle(get("/_next/static/app.js")).await;
        assert_eq!(stale.headers()[X_CACHE], "Hit");
        assert_eq!(stale.headers()[header::AGE], "30");
        assert_eq!(body_of(stale).await, "v1");

        tokio::time::advance(Duration::from_secs(31)).await;
        let fresh = edge.handle(get("/_next/static/app.js")).await;
        assert_eq!(fresh.headers()[X_CACHE], "Miss");
        assert_eq!(body_of(fresh).await, "v2");
    }

    #[tokio::test]
    async fn test_dynamic_paths_reach_router_uncached() {
        let store = Arc::new(MemoryAssetStore::new());
        let edge = edge(store, 60);

        let response = edge.handle(get("/home")).await;
        assert!(response.headers().get(X_CACHE).is_none());
        assert_eq!(body_of(response).await, "router saw /home");
        assert!(edge.cache().is_empty());
    }

    #[tokio::test]
    async fn test_missing_asset_is_404_and_not_cached() {
        let store = Arc::new(MemoryAssetStore::new());
        let edge = edge(store.clone(), 60);

        let response = edge.handle(get("/public/missing.png")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(edge.cache().is_empty());
    }

    #[tokio::test]
    async fn test_static_rejects_post_and_serves_head() {
        let store = Arc::new(MemoryAssetStore::new());
        let edge = edge(store.clone(), 60);
        publish(&store, "app.js", "console.log(1)").await;

        let post = Request::builder()
            .method(Method::POST)
            .uri("/_next/static/app.js")
            .body(Body::empty())
            .unwrap();
        let response = edge.handle(post).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");

        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/_next/static/app.js")
            .body(Body::empty())
            .unwrap();
        let response = edge.handle(head).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "14");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/javascript");
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = Arc::new(MemoryAssetStore::new());
        let edge = edge(store.clone(), 3600);
        publish(&store, "app.js", "v1").await;
        edge.handle(get("/_next/static/app.js")).await;

        publish(&store, "app.js", "v2").await;
        assert_eq!(edge.invalidate(&PathPattern::parse("/_next/static/*").unwrap()), 1);

        let response = edge.handle(get("/_next/static/app.js")).await;
        assert_eq!(body_of(response).await, "v2");
    }

    #[tokio::test]
    async fn test_dynamic_transport_failure_is_502() {
        let store = Arc::new(MemoryAssetStore::new());
        let edge = EdgeDistribution::new(
            BindingSet::reference(Duration::from_secs(60)),
            store,
            Arc::new(Unreachable),
        );
        let response = edge.handle(get("/home")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_handle_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let store = Arc::new(MemoryAssetStore::new());
        let edge = edge(store.clone(), 60);
        publish(&store, "app.js", "v1").await;

        let fut = edge.handle(get("/_next/static/app.js"));
        assert_send(&fut);
        assert_eq!(body_of(fut.await).await, "v1");
    }

    #[tokio::test]
    async fn test_dynamic_binding_enforces_allowed_methods() {
        let mut default = OriginBinding::dynamic_default();
        default.allowed_methods = vec![Method::GET];
        let edge = EdgeDistribution::new(
            BindingSet::new(Vec::new(), default),
            Arc::new(MemoryAssetStore::new()),
            echo_router(),
        );

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri("/home")
            .body(Body::empty())
            .unwrap();
        let response = edge.handle(delete).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");

        let response = edge.handle(get("/home")).await;
        assert_eq!(body_of(response).await, "router saw /home");
    }
}
