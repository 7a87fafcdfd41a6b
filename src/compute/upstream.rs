//! Upstream abstraction shared by compute targets and origins.
//!
//! # Responsibilities
//! - Define the `Upstream` seam (request in, response or transport error out)
//! - Forward requests to HTTP targets with URI rewrite
//! - Wrap in-process handlers as targets
//!
//! # Design Decisions
//! - Responses from the target are returned verbatim, including 5xx
//! - Only transport failures become `UpstreamError`
//! - No retries: one attempt per request

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{Request, Response, StatusCode, Uri};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::http::response;

pub type UpstreamFuture<'a> = BoxFuture<'a, Result<Response<Body>, UpstreamError>>;

/// Anything a request can be handed to: a page service, the router, an origin.
pub trait Upstream: Send + Sync + fmt::Debug {
    fn call(&self, request: Request<Body>) -> UpstreamFuture<'_>;
}

/// Transport-level failure talking to an upstream.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid target url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build upstream request: {0}")]
    InvalidRequest(String),
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    /// Status reported to the caller for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn into_response(self) -> Response<Body> {
        match self {
            UpstreamError::Timeout(_) => response::gateway_timeout(),
            other => response::bad_gateway(other.to_string()),
        }
    }
}

/// Forwards requests to a compute target reachable over HTTP.
#[derive(Clone)]
pub struct HttpTarget {
    base_url: Url,
    authority: Authority,
    base_path: String,
    client: Client<HttpConnector, Body>,
}

impl HttpTarget {
    /// Create a target for `base_url` (e.g. `http://10.0.0.5:8000`).
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, UpstreamError> {
        let invalid = |reason: &str| UpstreamError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(base_url).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only plain http targets are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| invalid(&e.to_string()))?;
        let base_path = url.path().trim_end_matches('/').to_string();

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            base_url: url,
            authority,
            base_path,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Point the request URI at this target, keeping path and query.
    fn rewrite_uri(&self, uri: &Uri) -> Result<Uri, UpstreamError> {
        let path_and_query = uri.path_and_query().map(PathAndQuery::as_str).unwrap_or("/");
        let joined = format!("{}{}", self.base_path, path_and_query);

        let mut parts = axum::http::uri::Parts::default();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        parts.path_and_query = Some(
            PathAndQuery::from_str(&joined)
                .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?,
        );
        Uri::from_parts(parts).map_err(|e| UpstreamError::InvalidRequest(e.to_string()))
    }
}

impl fmt::Debug for HttpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTarget")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl Upstream for HttpTarget {
    fn call(&self, request: Request<Body>) -> UpstreamFuture<'_> {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            parts.uri = self.rewrite_uri(&parts.uri)?;
            let outbound = Request::from_parts(parts, body);

            let response = self
                .client
                .request(outbound)
                .await
                .map_err(|e| UpstreamError::Unreachable(e.to_string()))?;

            let (parts, body) = response.into_parts();
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

type Handler = dyn Fn(Request<Body>) -> BoxFuture<'static, Response<Body>> + Send + Sync;

/// In-process compute target backed by an async closure.
#[derive(Clone)]
pub struct FnTarget {
    name: String,
    handler: Arc<Handler>,
}

impl FnTarget {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response<Body>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |req| -> BoxFuture<'static, Response<Body>> {
                Box::pin(handler(req))
            }),
        }
    }
}

impl fmt::Debug for FnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTarget").field("name", &self.name).finish()
    }
}

impl Upstream for FnTarget {
    fn call(&self, request: Request<Body>) -> UpstreamFuture<'_> {
        let fut = (self.handler)(request);
        Box::pin(async move { Ok(fut.await) })
    }
}
