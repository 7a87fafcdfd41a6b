//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting services (names, priorities)
//! - Check the edge has exactly one default binding
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MfeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use crate::config::schema::MfeConfig;
use crate::edge::binding::{BindingSet, OriginKind};
use crate::edge::cache::MAX_TTL_SECS;
use crate::routing::router::{MAX_PRIORITY, MIN_PRIORITY};
use crate::routing::PathPattern;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address `{value}`")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("edge bindings: {0}")]
    Bindings(String),
    #[error("edge binding `{0}` is cacheable but has ttl_secs = 0")]
    ZeroTtl(String),
    #[error("edge binding `{pattern}`: ttl_secs {ttl_secs} exceeds {MAX_TTL_SECS}")]
    TtlTooLong { pattern: String, ttl_secs: u64 },
    #[error("router.default_action: {0}")]
    DefaultAction(String),
    #[error("service `{service}`: {reason}")]
    Service { service: String, reason: String },
    #[error("services `{first}` and `{second}` share priority {priority}")]
    DuplicatePriority {
        first: String,
        second: String,
        priority: u32,
    },
    #[error("service name `{0}` is used more than once")]
    DuplicateService(String),
}

pub fn validate_config(config: &MfeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut addresses = vec![
        ("edge.bind_address", &config.edge.bind_address),
        ("router.bind_address", &config.router.bind_address),
    ];
    if config.admin.enabled {
        addresses.push(("admin.bind_address", &config.admin.bind_address));
    }
    if config.observability.metrics_enabled {
        addresses.push(("observability.metrics_address", &config.observability.metrics_address));
    }
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            });
        }
    }

    for (field, value) in [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.target_secs", config.timeouts.target_secs),
        ("edge.cache_sweep_secs", config.edge.cache_sweep_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if let Err(e) = BindingSet::from_config(&config.edge.bindings) {
        errors.push(ValidationError::Bindings(e.to_string()));
    }
    for binding in &config.edge.bindings {
        if binding.origin == OriginKind::Static && binding.cacheable && binding.ttl_secs == 0 {
            errors.push(ValidationError::ZeroTtl(binding.path_pattern.clone()));
        }
        if binding.ttl_secs > MAX_TTL_SECS {
            errors.push(ValidationError::TtlTooLong {
                pattern: binding.path_pattern.clone(),
                ttl_secs: binding.ttl_secs,
            });
        }
    }

    if let Some(Err(e)) = config.router.default_action.to_fixed_response().map(|f| f.validate()) {
        errors.push(ValidationError::DefaultAction(e.to_string()));
    }

    let mut names = HashSet::new();
    let mut priorities: HashMap<u32, &str> = HashMap::new();
    for service in &config.services {
        let fail = |reason: String| ValidationError::Service {
            service: service.name.clone(),
            reason,
        };

        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if let Err(e) = PathPattern::parse(service.path_pattern.clone()) {
            errors.push(fail(e.to_string()));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&service.priority) {
            errors.push(fail(format!(
                "priority {} outside {}..={}",
                service.priority, MIN_PRIORITY, MAX_PRIORITY
            )));
        }
        if let Some(first) = priorities.insert(service.priority, &service.name) {
            errors.push(ValidationError::DuplicatePriority {
                first: first.to_string(),
                second: service.name.clone(),
                priority: service.priority,
            });
        }
        if url::Url::parse(&service.target_url).is_err() {
            errors.push(fail(format!("invalid target_url `{}`", service.target_url)));
        }
        if let Some(path) = &service.health_path {
            if !path.starts_with('/') {
                errors.push(fail(format!("health_path `{}` must start with `/`", path)));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
