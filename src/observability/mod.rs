//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, edge, registry, publisher, readiness:
//!     → logging.rs (tracing events, EnvFilter)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows through both listeners via tower-http
//! - Metric updates are fire-and-forget

pub mod logging;
pub mod metrics;
