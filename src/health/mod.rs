//! Readiness checking for compute targets.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs)
//!     → GET <target><health_path> for every service not yet live
//!     → 2xx: ComputeService::mark_live
//!     → anything else: stay Registered, retry next tick
//! ```
//!
//! # Design Decisions
//! - Readiness is informational; the router forwards as soon as a rule exists
//! - A target is never demoted once live

pub mod active;

pub use active::{ReadinessMonitor, ReadinessProbe};
