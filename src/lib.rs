//! Micro-frontend dispatcher library.
//!
//! One public edge in front of a shared static asset store and a
//! priority-ordered router of page services, wired together through a
//! parameter registry.

pub mod admin;
pub mod assets;
pub mod compute;
pub mod config;
pub mod edge;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::schema::MfeConfig;
pub use edge::EdgeDistribution;
pub use lifecycle::{bootstrap, start, RunningApp, Shutdown};
pub use registry::ParameterStore;
pub use routing::Router;
