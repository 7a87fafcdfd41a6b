//! Parameter registry for cross-service discovery.
//!
//! # Data Flow
//! ```text
//! Shared stack (bootstrap):
//!     begin_generation()
//!     → put("s3StaticBucketArn", store handle, CreateOnly)
//!     → put("loadBalancerArn", router handle, CreateOnly)
//!
//! Page service (deployed strictly after):
//!     get("s3StaticBucketArn") → resolve store → publish assets
//!     get("loadBalancerArn")   → resolve router → register route
//! ```
//!
//! # Design Decisions
//! - Write-once per name per provisioning generation unless overwrite is explicit
//! - Last write wins; reads always see the latest value, no versions kept
//! - No notifications: dependents are ordered by deployment, not subscription
//! - `NotFound` is a startup failure for dependents, never retried

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::schema::RegistryConfig;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;

/// Reference key for the shared asset store handle.
pub const STATIC_BUCKET_KEY: &str = "s3StaticBucketArn";
/// Reference key for the router handle.
pub const LOAD_BALANCER_KEY: &str = "loadBalancerArn";

/// Longest accepted parameter name.
pub const MAX_NAME_LEN: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("parameter `{0}` not found")]
    NotFound(String),
    #[error("parameter `{0}` already written in this generation")]
    AlreadyExists(String),
    #[error("invalid parameter name `{0}`")]
    InvalidName(String),
    #[error("registry io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// How `put` treats an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Fail with `AlreadyExists` if written earlier in this generation.
    CreateOnly,
    /// Always write.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub value: String,
    /// Provisioning generation the value was written in.
    pub generation: u64,
    /// Unix seconds of the last write.
    pub updated_at: u64,
}

impl RegistryEntry {
    pub(crate) fn new(name: &str, value: &str, generation: u64) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            generation,
            updated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

/// Process-external name/value store shared by every deployed unit.
pub trait ParameterStore: Send + Sync + fmt::Debug {
    fn put(&self, name: &str, value: &str, mode: WriteMode) -> Result<RegistryEntry, RegistryError>;

    fn get(&self, name: &str) -> Result<RegistryEntry, RegistryError>;

    /// Operator cleanup only.
    fn delete(&self, name: &str) -> Result<RegistryEntry, RegistryError>;

    fn list(&self) -> Vec<RegistryEntry>;

    /// Start a new provisioning generation and return its number.
    fn begin_generation(&self) -> Result<u64, RegistryError>;

    fn generation(&self) -> u64;

    /// Convenience wrapper returning only the value.
    fn get_value(&self, name: &str) -> Result<String, RegistryError> {
        self.get(name).map(|entry| entry.value)
    }
}

/// Enforce write-once-per-generation for `CreateOnly` writes.
pub(crate) fn check_write(
    existing: Option<&RegistryEntry>,
    name: &str,
    mode: WriteMode,
    generation: u64,
) -> Result<(), RegistryError> {
    match existing {
        Some(entry) if mode == WriteMode::CreateOnly && entry.generation == generation => {
            Err(RegistryError::AlreadyExists(name.to_string()))
        }
        _ => Ok(()),
    }
}

/// Check a parameter name against the accepted character set.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'));
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_string()))
    }
}

/// Open the registry backend selected by configuration.
pub fn open(config: &RegistryConfig) -> Result<Arc<dyn ParameterStore>, RegistryError> {
    match &config.path {
        Some(path) => {
            let registry = FileRegistry::open(path)?;
            tracing::info!(path = %path, entries = registry.list().len(), "File registry opened");
            Ok(Arc::new(registry))
        }
        None => {
            tracing::info!("In-memory registry opened");
            Ok(Arc::new(MemoryRegistry::new()))
        }
    }
}
