//! Admin API: imperative registration and inspection.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::assets::AssetStore;
use crate::compute::ComputeService;
use crate::config::schema::AdminConfig;
use crate::edge::EdgeDistribution;
use crate::lifecycle::Deployment;
use crate::registry::ParameterStore;
use crate::routing::Router as DispatchRouter;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub router: Arc<DispatchRouter>,
    pub registry: Arc<dyn ParameterStore>,
    pub store: Arc<dyn AssetStore>,
    pub edge: Arc<EdgeDistribution>,
    /// Lifecycles by service name, from bootstrap and the admin API.
    pub services: Arc<DashMap<String, Arc<ComputeService>>>,
    pub api_key: Arc<str>,
    pub connect_timeout: Duration,
}

impl AdminState {
    pub fn from_deployment(deployment: &Deployment, api_key: &str, connect_timeout: Duration) -> Self {
        let services = DashMap::new();
        for deployed in &deployment.services {
            services.insert(deployed.config.name.clone(), deployed.service.clone());
        }
        Self {
            router: deployment.shared.router.clone(),
            registry: deployment.registry.clone(),
            store: deployment.shared.store.clone(),
            edge: deployment.edge.clone(),
            services: Arc::new(services),
            api_key: Arc::from(api_key),
            connect_timeout,
        }
    }
}

pub fn setup_admin_router(state: AdminState, config: &AdminConfig) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(list_routes).post(create_route))
        .route("/admin/routes/{name}", axum::routing::delete(delete_route))
        .route("/admin/parameters", get(list_parameters))
        .route("/admin/parameters/{name}", get(get_parameter).put(put_parameter))
        .route("/admin/assets/{*key}", put(put_asset))
        .route("/admin/cache/invalidate", post(invalidate_cache))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetStore;
    use crate::edge::BindingSet;
    use crate::registry::{MemoryRegistry, STATIC_BUCKET_KEY};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn state() -> AdminState {
        let router = Arc::new(DispatchRouter::new(None, Duration::from_secs(1)));
        let store: Arc<dyn AssetStore> = Arc::new(MemoryAssetStore::new());
        let edge = Arc::new(EdgeDistribution::new(
            BindingSet::reference(Duration::from_secs(60)),
            store.clone(),
            router.clone(),
        ));
        AdminState {
            router,
            registry: Arc::new(MemoryRegistry::new()),
            store,
            edge,
            services: Arc::new(DashMap::new()),
            api_key: Arc::from(KEY),
            connect_timeout: Duration::from_secs(1),
        }
    }

    fn app(state: AdminState) -> Router {
        setup_admin_router(state, &AdminConfig::default())
    }

    fn request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", KEY));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_of(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_missing_token() {
        let res = app(state())
            .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_route_registration_and_conflict() {
        let state = state();
        let body = serde_json::json!({
            "name": "maintenance",
            "path_pattern": "/maintenance*",
            "priority": 5,
            "fixed_response": { "status": 503, "content_type": "text/plain", "body": "down" }
        });
        let res = app(state.clone())
            .oneshot(request(Method::POST, "/admin/routes", Some(body)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(json_of(res).await["action"], "fixed_response");

        let clash = serde_json::json!({
            "name": "home",
            "path_pattern": "/home*",
            "priority": 5,
            "target_url": "http://127.0.0.1:3000"
        });
        let res = app(state.clone())
            .oneshot(request(Method::POST, "/admin/routes", Some(clash)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert!(state.services.is_empty());

        let res = app(state.clone())
            .oneshot(request(Method::DELETE, "/admin/routes/maintenance", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(state.router.rules().is_empty());
    }

    #[tokio::test]
    async fn test_fixed_response_with_bad_status_is_rejected() {
        let state = state();
        let body = serde_json::json!({
            "name": "broken",
            "path_pattern": "/broken*",
            "priority": 9,
            "fixed_response": { "status": 999, "content_type": "text/plain", "body": "?" }
        });
        let res = app(state.clone())
            .oneshot(request(Method::POST, "/admin/routes", Some(body)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(state.router.rules().is_empty());
    }

    #[tokio::test]
    async fn test_forward_route_tracks_lifecycle() {
        let state = state();
        let body = serde_json::json!({
            "name": "home",
            "path_pattern": "/home*",
            "priority": 100,
            "target_url": "http://127.0.0.1:3000"
        });
        app(state.clone())
            .oneshot(request(Method::POST, "/admin/routes", Some(body)))
            .await
            .unwrap();
        let status = json_of(app(state.clone()).oneshot(request(Method::GET, "/admin/status", None)).await.unwrap()).await;
        assert_eq!(status["services"][0]["state"], "registered");

        app(state.clone())
            .oneshot(request(Method::DELETE, "/admin/routes/home", None))
            .await
            .unwrap();
        let home = state.services.get("home").unwrap().value().clone();
        assert_eq!(home.state().label(), "deregistered");

        let res = app(state)
            .oneshot(request(Method::DELETE, "/admin/routes/home", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parameter_write_modes() {
        let state = state();
        let put = |overwrite: bool| {
            request(
                Method::PUT,
                &format!("/admin/parameters/{}", STATIC_BUCKET_KEY),
                Some(serde_json::json!({ "value": "mfe:store:a", "overwrite": overwrite })),
            )
        };

        let res = app(state.clone())
            .oneshot(request(Method::GET, &format!("/admin/parameters/{}", STATIC_BUCKET_KEY), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        assert_eq!(app(state.clone()).oneshot(put(false)).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app(state.clone()).oneshot(put(false)).await.unwrap().status(), StatusCode::CONFLICT);
        assert_eq!(app(state.clone()).oneshot(put(true)).await.unwrap().status(), StatusCode::OK);

        let listed = json_of(app(state).oneshot(request(Method::GET, "/admin/parameters", None)).await.unwrap()).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_asset_upload_and_invalidation() {
        let state = state();
        let upload = Request::builder()
            .method(Method::PUT)
            .uri("/admin/assets/public/logo.svg")
            .header(header::AUTHORIZATION, format!("Bearer {}", KEY))
            .header(handlers::X_ASSET_OWNER, "home")
            .body(Body::from("<svg/>"))
            .unwrap();
        let res = app(state.clone()).oneshot(upload).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let asset = state.store.get("public/logo.svg").await.unwrap();
        assert_eq!(asset.content_type, "image/svg+xml");
        assert_eq!(asset.owner.as_deref(), Some("home"));

        let get = Request::builder().uri("/public/logo.svg").body(Body::empty()).unwrap();
        state.edge.handle(get).await;
        assert_eq!(state.edge.cache().len(), 1);

        let res = app(state.clone())
            .oneshot(request(
                Method::POST,
                "/admin/cache/invalidate",
                Some(serde_json::json!({ "pattern": "/public/*" })),
            ))
            .await
            .unwrap();
        assert_eq!(json_of(res).await["removed"], 1);
        assert!(state.edge.cache().is_empty());
    }
}
