//! Compute target lifecycle.
//!
//! # States
//! ```text
//! Unregistered → Registered(priority, pattern) → Live → Deregistered
//!                      ↑                                     │
//!                      └──────────── redeploy ───────────────┘
//! ```
//!
//! # Design Decisions
//! - The router forwards as soon as a rule exists; `Live` is informational
//! - Readiness is external (probe or explicit `mark_live`)
//! - The state lock is held across the router mutation so state and table agree

use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::compute::upstream::Upstream;
use crate::routing::{PathPattern, RouteError, RouteRule, Router, TargetRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetState {
    Unregistered,
    Registered { priority: u32, pattern: String },
    Live { priority: u32, pattern: String },
    Deregistered,
}

impl TargetState {
    pub fn label(&self) -> &'static str {
        match self {
            TargetState::Unregistered => "unregistered",
            TargetState::Registered { .. } => "registered",
            TargetState::Live { .. } => "live",
            TargetState::Deregistered => "deregistered",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {action} target `{target}` while {state}")]
    InvalidTransition {
        target: String,
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Route(#[from] RouteError),
}

/// One page service's compute target and where it is in its lifecycle.
#[derive(Debug)]
pub struct ComputeService {
    name: String,
    upstream: Arc<dyn Upstream>,
    state: Mutex<TargetState>,
}

impl ComputeService {
    pub fn new(name: impl Into<String>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            name: name.into(),
            upstream,
            state: Mutex::new(TargetState::Unregistered),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TargetState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Attach a forward rule for this target. Allowed from `Unregistered` or `Deregistered`.
    pub fn register(
        &self,
        router: &Router,
        pattern: PathPattern,
        priority: u32,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            TargetState::Unregistered | TargetState::Deregistered => {}
            ref other => return Err(self.invalid("register", other)),
        }

        let target = TargetRef {
            name: self.name.clone(),
            upstream: self.upstream.clone(),
        };
        let pattern_str = pattern.to_string();
        router.register_route(RouteRule::forward(self.name.clone(), pattern, priority, target))?;

        *state = TargetState::Registered {
            priority,
            pattern: pattern_str,
        };
        Ok(())
    }

    /// Record that the target's infrastructure is ready. Idempotent once live.
    pub fn mark_live(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            TargetState::Registered { priority, pattern } => {
                tracing::info!(service = %self.name, "Target is live");
                *state = TargetState::Live {
                    priority: *priority,
                    pattern: pattern.clone(),
                };
                Ok(())
            }
            TargetState::Live { .. } => Ok(()),
            other => Err(self.invalid("mark live", other)),
        }
    }

    /// Remove this target's rule and free its priority.
    pub fn deregister(&self, router: &Router) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            TargetState::Registered { .. } | TargetState::Live { .. } => {}
            ref other => return Err(self.invalid("deregister", other)),
        }
        router.deregister_route(&self.name)?;
        *state = TargetState::Deregistered;
        Ok(())
    }

    fn invalid(&self, action: &'static str, state: &TargetState) -> LifecycleError {
        LifecycleError::InvalidTransition {
            target: self.name.clone(),
            action,
            state: state.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::upstream::FnTarget;
    use crate::http::response::text_response;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;

    fn service(name: &'static str) -> ComputeService {
        ComputeService::new(
            name,
            Arc::new(FnTarget::new(name, move |_req: Request<Body>| async move {
                text_response(StatusCode::OK, name)
            })),
        )
    }

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn test_full_lifecycle() {
        let router = Router::new(None, Duration::from_secs(1));
        let home = service("home");
        assert_eq!(home.state(), TargetState::Unregistered);

        home.register(&router, pattern("/home*"), 100).unwrap();
        assert_eq!(home.state().label(), "registered");
        assert!(router.match_path("/home").is_some());

        home.mark_live().unwrap();
        home.mark_live().unwrap();
        assert_eq!(
            home.state(),
            TargetState::Live { priority: 100, pattern: "/home*".into() }
        );

        home.deregister(&router).unwrap();
        assert_eq!(home.state(), TargetState::Deregistered);
        assert!(router.match_path("/home").is_none());

        // Redeploy takes the same priority again.
        home.register(&router, pattern("/home*"), 100).unwrap();
        assert_eq!(home.state().label(), "registered");
    }

    #[test]
    fn test_invalid_transitions() {
        let router = Router::new(None, Duration::from_secs(1));
        let home = service("home");

        assert!(matches!(home.mark_live(), Err(LifecycleError::InvalidTransition { .. })));
        assert!(matches!(home.deregister(&router), Err(LifecycleError::InvalidTransition { .. })));

        home.register(&router, pattern("/home*"), 100).unwrap();
        assert!(matches!(
            home.register(&router, pattern("/home*"), 100),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_conflicting_register_stays_unregistered() {
        let router = Router::new(None, Duration::from_secs(1));
        service("home").register(&router, pattern("/home*"), 100).unwrap();

        let product = service("product");
        let err = product.register(&router, pattern("/product*"), 100).unwrap_err();
        assert!(matches!(err, LifecycleError::Route(RouteError::PriorityConflict { .. })));
        assert_eq!(product.state(), TargetState::Unregistered);
    }
}
