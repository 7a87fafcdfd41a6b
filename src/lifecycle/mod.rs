//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open registry → begin generation → shared store + router
//!     → publish handles → deploy services in order → edge distribution
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → listeners drain, background tasks exit
//!
//! Runtime (runtime.rs):
//!     Bind listeners → spawn sweeper and readiness monitor → RunningApp
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: registry first, shared stack next, services last
//! - Listeners start only after every service is deployed

pub mod runtime;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use runtime::{start, RunningApp, RuntimeError};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{
    bootstrap, deploy_service, provision_shared, router_handle, store_handle, BootstrapError,
    DeployedService, Deployment, Infrastructure, SharedStack,
};
