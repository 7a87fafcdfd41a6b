//! Route table and dispatch.
//!
//! # Responsibilities
//! - Store live route rules ordered by priority
//! - Register and deregister rules at runtime
//! - Dispatch a request to exactly one action
//!
//! # Design Decisions
//! - The table is an immutable snapshot behind `ArcSwap`; readers never lock
//! - Writers serialize on a mutex and publish a complete new table
//! - Priority conflicts are rejected at registration, never at request time
//! - Lower priority number = evaluated first
//! - No retry and no fallback target after a match

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::compute::upstream::{Upstream, UpstreamError, UpstreamFuture};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::matcher::{PathPattern, PatternError};

/// Lowest accepted rule priority.
pub const MIN_PRIORITY: u32 = 1;
/// Highest accepted rule priority.
pub const MAX_PRIORITY: u32 = 50_000;

/// Status/body/headers triple returned without invoking a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl FixedResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Status must be `100..=599`; anything else is rejected at registration.
    pub fn validate(&self) -> Result<(), RouteError> {
        if (100..=599).contains(&self.status) {
            Ok(())
        } else {
            Err(RouteError::InvalidStatus(self.status))
        }
    }

    pub fn to_response(&self) -> Response<Body> {
        let mut res = Response::new(Body::from(self.body.clone()));
        *res.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            res.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        res
    }
}

impl Default for FixedResponse {
    fn default() -> Self {
        Self::new(200, "text/plain", "Default response from ALB!")
    }
}

/// Named handle to a compute target.
#[derive(Debug, Clone)]
pub struct TargetRef {
    pub name: String,
    pub upstream: Arc<dyn Upstream>,
}

#[derive(Debug, Clone)]
pub enum RouteAction {
    Forward(TargetRef),
    FixedResponse(FixedResponse),
}

/// A single dispatch rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub name: String,
    pub pattern: PathPattern,
    pub priority: u32,
    pub action: RouteAction,
}

impl RouteRule {
    pub fn forward(
        name: impl Into<String>,
        pattern: PathPattern,
        priority: u32,
        target: TargetRef,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            priority,
            action: RouteAction::Forward(target),
        }
    }

    pub fn fixed(
        name: impl Into<String>,
        pattern: PathPattern,
        priority: u32,
        response: FixedResponse,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            priority,
            action: RouteAction::FixedResponse(response),
        }
    }

    /// Name of the forward target, if any.
    pub fn target_name(&self) -> Option<&str> {
        match &self.action {
            RouteAction::Forward(target) => Some(&target.name),
            RouteAction::FixedResponse(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("priority {priority} is already held by rule `{existing}`")]
    PriorityConflict { priority: u32, existing: String },
    #[error("priority {0} is outside {MIN_PRIORITY}..={MAX_PRIORITY}")]
    PriorityOutOfRange(u32),
    #[error("a rule named `{0}` is already registered")]
    DuplicateName(String),
    #[error("no rule named `{0}`")]
    RuleNotFound(String),
    #[error("fixed response status {0} is outside 100..=599")]
    InvalidStatus(u16),
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

#[derive(Debug, Default)]
struct RouteTable {
    /// Sorted ascending by priority.
    rules: Vec<Arc<RouteRule>>,
}

impl RouteTable {
    fn find(&self, path: &str) -> Option<&Arc<RouteRule>> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }
}

/// Priority-ordered dispatch table in front of the compute targets.
#[derive(Debug)]
pub struct Router {
    table: ArcSwap<RouteTable>,
    write_lock: Mutex<()>,
    default_action: Option<FixedResponse>,
    target_timeout: Duration,
}

impl Router {
    pub fn new(default_action: Option<FixedResponse>, target_timeout: Duration) -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            write_lock: Mutex::new(()),
            default_action,
            target_timeout,
        }
    }

    pub fn default_action(&self) -> Option<&FixedResponse> {
        self.default_action.as_ref()
    }

    /// Add a rule. The existing table stays untouched on error.
    pub fn register_route(&self, rule: RouteRule) -> Result<(), RouteError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&rule.priority) {
            return Err(RouteError::PriorityOutOfRange(rule.priority));
        }
        if let RouteAction::FixedResponse(fixed) = &rule.action {
            fixed.validate()?;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.table.load_full();

        if let Some(existing) = current.rules.iter().find(|r| r.priority == rule.priority) {
            return Err(RouteError::PriorityConflict {
                priority: rule.priority,
                existing: existing.name.clone(),
            });
        }
        if current.rules.iter().any(|r| r.name == rule.name) {
            return Err(RouteError::DuplicateName(rule.name));
        }

        tracing::info!(
            rule = %rule.name,
            pattern = %rule.pattern,
            priority = rule.priority,
            service = rule.target_name().unwrap_or("fixed-response"),
            "Route registered"
        );

        let mut rules = current.rules.clone();
        let idx = rules.partition_point(|r| r.priority < rule.priority);
        rules.insert(idx, Arc::new(rule));
        self.table.store(Arc::new(RouteTable { rules }));
        metrics::record_route_count(self.table.load().rules.len());
        Ok(())
    }

    /// Remove a rule by name, freeing its priority.
    pub fn deregister_route(&self, name: &str) -> Result<Arc<RouteRule>, RouteError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.table.load_full();

        let idx = current
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| RouteError::RuleNotFound(name.to_string()))?;

        let mut rules = current.rules.clone();
        let removed = rules.remove(idx);
        self.table.store(Arc::new(RouteTable { rules }));

        tracing::info!(rule = %removed.name, priority = removed.priority, "Route deregistered");
        metrics::record_route_count(self.table.load().rules.len());
        Ok(removed)
    }

    /// Snapshot of the live rules in evaluation order.
    pub fn rules(&self) -> Vec<Arc<RouteRule>> {
        self.table.load().rules.clone()
    }

    /// The rule a request for `path` would hit, if any.
    pub fn match_path(&self, path: &str) -> Option<Arc<RouteRule>> {
        self.table.load().find(path).cloned()
    }

    /// Run exactly one action for the request.
    pub async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let path = request.uri().path().to_string();

        let Some(rule) = self.match_path(&path) else {
            let response = match &self.default_action {
                Some(fixed) => fixed.to_response(),
                None => response::not_found(),
            };
            tracing::debug!(path = %path, status = response.status().as_u16(), "No rule matched, default action");
            metrics::record_dispatch("default", response.status().as_u16(), start);
            return response;
        };

        let response = match &rule.action {
            RouteAction::FixedResponse(fixed) => fixed.to_response(),
            RouteAction::Forward(target) => self.forward(target, request).await,
        };

        tracing::debug!(
            path = %path,
            rule = %rule.name,
            priority = rule.priority,
            status = response.status().as_u16(),
            "Request dispatched"
        );
        metrics::record_dispatch(&rule.name, response.status().as_u16(), start);
        response
    }

    async fn forward(&self, target: &TargetRef, request: Request<Body>) -> Response<Body> {
        let result = tokio::time::timeout(self.target_timeout, target.upstream.call(request))
            .await
            .unwrap_or(Err(UpstreamError::Timeout(self.target_timeout)));

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(service = %target.name, error = %e, "Target invocation failed");
                e.into_response()
            }
        }
    }
}

impl Upstream for Router {
    fn call(&self, request: Request<Body>) -> UpstreamFuture<'_> {
        Box::pin(async move { Ok(self.dispatch(request).await) })
    }
}
