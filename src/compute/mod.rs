//! Compute targets for page services.
//!
//! # Data Flow
//! ```text
//! Page service deploy:
//!     HttpTarget (base url) / FnTarget (closure)
//!     → lifecycle.rs ComputeService::register (adds router rule)
//!     → readiness probe marks Live
//!     → deregister removes rule on retirement
//!
//! Request:
//!     Router → Upstream::call → target response (verbatim)
//! ```

pub mod lifecycle;
pub mod upstream;

pub use lifecycle::{ComputeService, LifecycleError, TargetState};
pub use upstream::{FnTarget, HttpTarget, Upstream, UpstreamError, UpstreamFuture};
