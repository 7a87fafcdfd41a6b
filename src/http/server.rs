//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the edge and router Axum apps
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Serve a listener until shutdown

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::TimeoutConfig;
use crate::edge::EdgeDistribution;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::routing::Router as DispatchRouter;

/// Public listener: everything goes through the edge distribution.
pub fn edge_app(edge: Arc<EdgeDistribution>, timeouts: &TimeoutConfig) -> Router {
    let app = Router::new()
        .route("/{*path}", any(edge_handler))
        .route("/", any(edge_handler))
        .with_state(edge);
    with_middleware(app, timeouts)
}

/// Router listener: the dynamic origin when the edge reaches it over HTTP.
pub fn router_app(router: Arc<DispatchRouter>, timeouts: &TimeoutConfig) -> Router {
    let app = Router::new()
        .route("/{*path}", any(router_handler))
        .route("/", any(router_handler))
        .with_state(router);
    with_middleware(app, timeouts)
}

#[allow(deprecated)]
fn with_middleware(app: Router, timeouts: &TimeoutConfig) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = request_id(request).unwrap_or("-"),
        )
    });

    app.layer(
        ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(trace)
            .layer(propagate_request_id_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs))),
    )
}

async fn edge_handler(
    State(edge): State<Arc<EdgeDistribution>>,
    request: Request<Body>,
) -> Response<Body> {
    edge.handle(request).await
}

async fn router_handler(
    State(router): State<Arc<DispatchRouter>>,
    request: Request<Body>,
) -> Response<Body> {
    router.dispatch(request).await
}

/// Serve `app` on `listener` until `shutdown` fires, then drain.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    name: &'static str,
    shutdown: Shutdown,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(listener = name, address = %addr, "HTTP server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.signalled())
        .await?;

    tracing::info!(listener = name, "HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetStore;
    use crate::edge::BindingSet;
    use crate::http::request::X_REQUEST_ID;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_app_sets_request_id() {
        let router = Arc::new(DispatchRouter::new(None, Duration::from_secs(1)));
        let app = router_app(router, &TimeoutConfig::default());

        let res = app
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_edge_app_keeps_incoming_request_id() {
        let router = Arc::new(DispatchRouter::new(None, Duration::from_secs(1)));
        let edge = Arc::new(EdgeDistribution::new(
            BindingSet::reference(Duration::from_secs(60)),
            Arc::new(MemoryAssetStore::new()),
            router,
        ));
        let app = edge_app(edge, &TimeoutConfig::default());

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.headers()[X_REQUEST_ID], "req-42");
    }
}
