//! Origin bindings.
//!
//! # Design Decisions
//! - Explicit bindings are evaluated in configured order, then the default
//! - This ordering is independent of router rule priorities
//! - Exactly one default binding; it matches everything left over

use axum::http::{HeaderName, Method};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::config::schema::BindingConfig;
use crate::routing::{PathPattern, PatternError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    /// Shared asset store.
    Static,
    /// The router.
    Dynamic,
}

impl OriginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginKind::Static => "static",
            OriginKind::Dynamic => "dynamic",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("no default binding configured")]
    NoDefault,
    #[error("{0} default bindings configured, exactly one is allowed")]
    MultipleDefaults(usize),
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
    #[error("invalid forwarded header `{0}`")]
    InvalidHeader(String),
    #[error("invalid method `{0}`")]
    InvalidMethod(String),
}

#[derive(Debug, Clone)]
pub struct OriginBinding {
    pub pattern: PathPattern,
    pub origin: OriginKind,
    pub cacheable: bool,
    pub ttl: Duration,
    /// Store namespace prepended to every key.
    pub origin_path: String,
    pub strip_prefix: bool,
    /// Request headers whose values take part in the cache key.
    pub forwarded_headers: Vec<HeaderName>,
    /// Empty means every method.
    pub allowed_methods: Vec<Method>,
}

impl OriginBinding {
    /// Cached static binding with GET/HEAD only.
    pub fn static_assets(pattern: PathPattern, ttl: Duration) -> Self {
        Self {
            pattern,
            origin: OriginKind::Static,
            cacheable: true,
            ttl,
            origin_path: String::new(),
            strip_prefix: false,
            forwarded_headers: Vec::new(),
            allowed_methods: vec![Method::GET, Method::HEAD],
        }
    }

    /// Uncached pass-through to the router.
    pub fn dynamic_default() -> Self {
        Self {
            pattern: PathPattern::any(),
            origin: OriginKind::Dynamic,
            cacheable: false,
            ttl: Duration::ZERO,
            origin_path: String::new(),
            strip_prefix: false,
            forwarded_headers: Vec::new(),
            allowed_methods: Vec::new(),
        }
    }

    pub fn from_config(config: &BindingConfig) -> Result<Self, BindingError> {
        let pattern = if config.default {
            PathPattern::any()
        } else {
            PathPattern::parse(config.path_pattern.clone())?
        };

        let forwarded_headers = config
            .forwarded_headers
            .iter()
            .map(|h| HeaderName::from_str(h).map_err(|_| BindingError::InvalidHeader(h.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut allowed_methods = config
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_str(&m.to_ascii_uppercase())
                    .map_err(|_| BindingError::InvalidMethod(m.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if allowed_methods.is_empty() && config.origin == OriginKind::Static {
            allowed_methods = vec![Method::GET, Method::HEAD];
        }

        Ok(Self {
            pattern,
            origin: config.origin,
            cacheable: config.cacheable && config.origin == OriginKind::Static,
            ttl: Duration::from_secs(config.ttl_secs),
            origin_path: config.origin_path.trim_matches('/').to_string(),
            strip_prefix: config.strip_prefix,
            forwarded_headers,
            allowed_methods,
        })
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods.is_empty() || self.allowed_methods.contains(method)
    }

    /// Store key for a request path.
    pub fn store_key(&self, path: &str) -> String {
        let mut rest = path;
        if self.strip_prefix {
            rest = rest.strip_prefix(self.pattern.literal_prefix()).unwrap_or(rest);
        }
        let rest = rest.trim_start_matches('/');
        if self.origin_path.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", self.origin_path, rest)
        }
    }
}

/// Ordered explicit bindings plus the mandatory default.
#[derive(Debug, Clone)]
pub struct BindingSet {
    explicit: Vec<OriginBinding>,
    default: OriginBinding,
}

impl BindingSet {
    pub fn new(explicit: Vec<OriginBinding>, default: OriginBinding) -> Self {
        Self { explicit, default }
    }

    /// `/_next/*` and `/public/*` to the store, everything else to the router.
    pub fn reference(ttl: Duration) -> Self {
        let explicit = ["/_next/*", "/public/*"]
            .into_iter()
            .filter_map(|raw| PathPattern::parse(raw).ok())
            .map(|pattern| OriginBinding::static_assets(pattern, ttl))
            .collect();
        Self::new(explicit, OriginBinding::dynamic_default())
    }

    pub fn from_config(configs: &[BindingConfig]) -> Result<Self, BindingError> {
        let defaults = configs.iter().filter(|c| c.default).count();
        match defaults {
            0 => return Err(BindingError::NoDefault),
            1 => {}
            n => return Err(BindingError::MultipleDefaults(n)),
        }

        let mut explicit = Vec::new();
        let mut default = None;
        for config in configs {
            let binding = OriginBinding::from_config(config)?;
            if config.default {
                default = Some(binding);
            } else {
                explicit.push(binding);
            }
        }
        let default = default.ok_or(BindingError::NoDefault)?;
        Ok(Self { explicit, default })
    }

    /// First explicit binding matching `path`, else the default.
    pub fn resolve(&self, path: &str) -> &OriginBinding {
        self.explicit
            .iter()
            .find(|b| b.pattern.matches(path))
            .unwrap_or(&self.default)
    }

    pub fn explicit(&self) -> &[OriginBinding] {
        &self.explicit
    }
}
