//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MfeConfig (validated, immutable)
//!     → shared by reference with bootstrap and servers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; runtime changes go through the admin API
//! - All fields have defaults to allow minimal configs
//! - Defaults reproduce the reference deployment (`/_next/*`, `/public/*`, ALB default)
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AssetsConfig, BindingConfig, EdgeConfig, MfeConfig, ObservabilityConfig,
    ReadinessConfig, RegistryConfig, RouterConfig, ServiceAssetConfig, ServiceConfig,
    TimeoutConfig,
};
