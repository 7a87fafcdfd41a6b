//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::edge::binding::OriginKind;
use crate::registry::{LOAD_BALANCER_KEY, STATIC_BUCKET_KEY};
use crate::routing::FixedResponse;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MfeConfig {
    /// Public edge distribution.
    pub edge: EdgeConfig,

    /// Router listener and default action.
    pub router: RouterConfig,

    /// Parameter registry backend and reference keys.
    pub registry: RegistryConfig,

    /// Shared asset store backend.
    pub assets: AssetsConfig,

    /// Page services deployed at startup, in order.
    pub services: Vec<ServiceConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Readiness probing of page services.
    pub readiness: ReadinessConfig,
}

/// Edge distribution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Public bind address.
    pub bind_address: String,

    /// Router listener URL used as dynamic origin. In-process router when absent.
    pub dynamic_origin: Option<String>,

    /// Interval between expired-entry sweeps.
    pub cache_sweep_secs: u64,

    /// Origin bindings; explicit ones are evaluated in this order.
    pub bindings: Vec<BindingConfig>,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            dynamic_origin: None,
            cache_sweep_secs: 60,
            bindings: vec![
                BindingConfig::static_assets("/_next/*"),
                BindingConfig::static_assets("/public/*"),
                BindingConfig::dynamic_default(),
            ],
        }
    }
}

/// One origin binding.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BindingConfig {
    /// Path pattern; ignored for the default binding.
    #[serde(default = "default_any_pattern")]
    pub path_pattern: String,

    pub origin: OriginKind,

    /// Marks the catch-all binding. Exactly one is required.
    #[serde(default)]
    pub default: bool,

    #[serde(default = "default_true")]
    pub cacheable: bool,

    /// Cache time-to-live for static responses.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Store namespace prepended to the key.
    #[serde(default)]
    pub origin_path: String,

    /// Remove the pattern's literal prefix before building the key.
    #[serde(default)]
    pub strip_prefix: bool,

    /// Request headers that are part of the cache key.
    #[serde(default)]
    pub forwarded_headers: Vec<String>,

    /// Allowed methods; empty means GET/HEAD for static and all for dynamic.
    #[serde(default)]
    pub allowed_methods: Vec<String>,
}

impl BindingConfig {
    pub fn static_assets(pattern: &str) -> Self {
        Self {
            path_pattern: pattern.to_string(),
            origin: OriginKind::Static,
            default: false,
            cacheable: true,
            ttl_secs: default_ttl_secs(),
            origin_path: String::new(),
            strip_prefix: false,
            forwarded_headers: Vec::new(),
            allowed_methods: Vec::new(),
        }
    }

    pub fn dynamic_default() -> Self {
        Self {
            path_pattern: default_any_pattern(),
            origin: OriginKind::Dynamic,
            default: true,
            cacheable: false,
            ttl_secs: 0,
            origin_path: String::new(),
            strip_prefix: false,
            forwarded_headers: Vec::new(),
            allowed_methods: Vec::new(),
        }
    }
}

fn default_any_pattern() -> String {
    "*".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    86_400
}

/// Router listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Router listener bind address.
    pub bind_address: String,

    /// Response when no rule matches.
    pub default_action: DefaultActionConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
            default_action: DefaultActionConfig::default(),
        }
    }
}

/// Default action; disabled means unmatched requests get 404.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultActionConfig {
    pub enabled: bool,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl Default for DefaultActionConfig {
    fn default() -> Self {
        let reference = FixedResponse::default();
        Self {
            enabled: true,
            status: reference.status,
            content_type: reference.content_type,
            body: reference.body,
        }
    }
}

impl DefaultActionConfig {
    pub fn to_fixed_response(&self) -> Option<FixedResponse> {
        self.enabled
            .then(|| FixedResponse::new(self.status, self.content_type.clone(), self.body.clone()))
    }
}

/// Parameter registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON file for a durable registry; in-memory when absent.
    pub path: Option<String>,

    /// Key holding the asset store handle.
    pub store_handle_key: String,

    /// Key holding the router handle.
    pub router_handle_key: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: None,
            store_handle_key: STATIC_BUCKET_KEY.to_string(),
            router_handle_key: LOAD_BALANCER_KEY.to_string(),
        }
    }
}

/// Shared asset store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory for a filesystem store; in-memory when absent.
    pub root: Option<String>,

    /// Name used in the store's registry handle.
    pub bucket_name: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: None,
            bucket_name: "mfe-static-assets".to_string(),
        }
    }
}

/// A page service: compute target, routing rule and static assets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name; also the rule name and asset owner.
    pub name: String,

    /// Router path pattern (e.g. `/home*`).
    pub path_pattern: String,

    /// Router rule priority (lower = evaluated first).
    pub priority: u32,

    /// Base URL of the compute target.
    pub target_url: String,

    /// Readiness probe path on the target.
    #[serde(default)]
    pub health_path: Option<String>,

    #[serde(default)]
    pub assets: Vec<ServiceAssetConfig>,
}

/// One build output directory to publish.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceAssetConfig {
    pub source_dir: String,
    pub destination_prefix: String,
    #[serde(default)]
    pub prune: bool,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total time a listener allows per request in seconds.
    pub request_secs: u64,

    /// Deadline for a compute target to answer in seconds.
    pub target_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
            target_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Largest accepted asset upload in bytes.
    pub max_upload_bytes: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Readiness probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
        }
    }
}
