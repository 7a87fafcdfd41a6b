//! Edge distribution subsystem.
//!
//! # Data Flow
//! ```text
//! Public request
//!     → binding.rs (first explicit binding in configured order, else default)
//!     → distribution.rs
//!         static origin:  cache.rs (TTL) → shared asset store
//!         dynamic origin: router (uncached)
//! ```

pub mod binding;
pub mod cache;
pub mod distribution;

pub use binding::{BindingError, BindingSet, OriginBinding, OriginKind};
pub use cache::{run_sweeper, CacheKey, CachedResponse, ResponseCache};
pub use distribution::{EdgeDistribution, X_CACHE};
