//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (snapshot of live rules, ascending priority)
//!     → matcher.rs (evaluate path pattern)
//!     → First match: Forward to target | FixedResponse
//!     → No match: default action (or 404)
//!
//! Registration (page service deploy / admin API):
//!     RouteRule
//!     → Reject priority conflicts
//!     → Insert in priority order
//!     → Atomically swap the table
//! ```
//!
//! # Design Decisions
//! - Rules are mutable at runtime, but every change is a whole-table swap
//! - Deterministic: same table and path always hit the same rule
//! - First match wins (ordered by priority)

pub mod matcher;
pub mod router;

pub use matcher::{PathPattern, PatternError};
pub use router::{FixedResponse, RouteAction, RouteError, RouteRule, Router, TargetRef};
