use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::admin::AdminState;
use crate::assets::store::content_type_for;
use crate::assets::{Asset, AssetError};
use crate::compute::{ComputeService, HttpTarget, LifecycleError, TargetState};
use crate::registry::{RegistryEntry, RegistryError, WriteMode};
use crate::routing::{FixedResponse, PathPattern, RouteAction, RouteError, RouteRule};

/// Header naming the publisher of an uploaded asset.
pub const X_ASSET_OWNER: &str = "x-asset-owner";

/// Error body: `{"error": "..."}`.
#[derive(Debug)]
pub struct AdminError {
    status: StatusCode,
    message: String,
}

impl AdminError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<RouteError> for AdminError {
    fn from(e: RouteError) -> Self {
        let status = match e {
            RouteError::PriorityConflict { .. } | RouteError::DuplicateName(_) => StatusCode::CONFLICT,
            RouteError::RuleNotFound(_) => StatusCode::NOT_FOUND,
            RouteError::PriorityOutOfRange(_)
            | RouteError::InvalidPattern(_)
            | RouteError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, e.to_string())
    }
}

impl From<LifecycleError> for AdminError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Route(route) => route.into(),
            other => Self::new(StatusCode::CONFLICT, other.to_string()),
        }
    }
}

impl From<RegistryError> for AdminError {
    fn from(e: RegistryError) -> Self {
        let status = match e {
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::AlreadyExists(_) => StatusCode::CONFLICT,
            RegistryError::InvalidName(_) => StatusCode::BAD_REQUEST,
            RegistryError::Io(_) | RegistryError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<AssetError> for AdminError {
    fn from(e: AssetError) -> Self {
        let status = match e {
            AssetError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            AssetError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub generation: u64,
    pub rules: usize,
    pub cache_entries: usize,
    pub services: Vec<ServiceStatus>,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub name: String,
    #[serde(flatten)]
    pub state: TargetState,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let mut services: Vec<_> = state
        .services
        .iter()
        .map(|entry| ServiceStatus {
            name: entry.key().clone(),
            state: entry.value().state(),
        })
        .collect();
    services.sort_by(|a, b| a.name.cmp(&b.name));

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        generation: state.registry.generation(),
        rules: state.router.rules().len(),
        cache_entries: state.edge.cache().len(),
        services,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteView {
    pub name: String,
    pub path_pattern: String,
    pub priority: u32,
    /// `forward` or `fixed_response`.
    pub action: String,
    pub target: Option<String>,
}

impl From<&RouteRule> for RouteView {
    fn from(rule: &RouteRule) -> Self {
        let action = match rule.action {
            RouteAction::Forward(_) => "forward",
            RouteAction::FixedResponse(_) => "fixed_response",
        };
        Self {
            name: rule.name.clone(),
            path_pattern: rule.pattern.to_string(),
            priority: rule.priority,
            action: action.to_string(),
            target: rule.target_name().map(str::to_string),
        }
    }
}

pub async fn list_routes(State(state): State<AdminState>) -> Json<Vec<RouteView>> {
    Json(state.router.rules().iter().map(|rule| RouteView::from(rule.as_ref())).collect())
}

/// New rule: exactly one of `target_url` and `fixed_response`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RouteSpec {
    pub name: String,
    pub path_pattern: String,
    pub priority: u32,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub fixed_response: Option<FixedResponse>,
}

pub async fn create_route(
    State(state): State<AdminState>,
    Json(spec): Json<RouteSpec>,
) -> Result<(StatusCode, Json<RouteView>), AdminError> {
    let pattern = PathPattern::parse(spec.path_pattern.clone()).map_err(RouteError::from)?;

    match (spec.target_url, spec.fixed_response) {
        (Some(url), None) => {
            let target = HttpTarget::new(&url, state.connect_timeout)
                .map_err(|e| AdminError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
            // A fresh lifecycle; an active rule of the same name is rejected by the router.
            let service = Arc::new(ComputeService::new(spec.name.clone(), Arc::new(target)));
            service.register(&state.router, pattern, spec.priority)?;
            state.services.insert(spec.name.clone(), service);
        }
        (None, Some(fixed)) => {
            state
                .router
                .register_route(RouteRule::fixed(spec.name.clone(), pattern, spec.priority, fixed))?;
        }
        _ => {
            return Err(AdminError::new(
                StatusCode::BAD_REQUEST,
                "exactly one of target_url and fixed_response is required",
            ))
        }
    }

    let rule = state
        .router
        .rules()
        .into_iter()
        .find(|rule| rule.name == spec.name)
        .ok_or_else(|| AdminError::new(StatusCode::INTERNAL_SERVER_ERROR, "rule vanished after registration"))?;
    Ok((StatusCode::CREATED, Json(RouteView::from(rule.as_ref()))))
}

pub async fn delete_route(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AdminError> {
    let service = state.services.get(&name).map(|entry| entry.value().clone());
    match service {
        Some(service) if matches!(service.state(), TargetState::Registered { .. } | TargetState::Live { .. }) => {
            service.deregister(&state.router)?;
        }
        _ => {
            state.router.deregister_route(&name)?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_parameters(State(state): State<AdminState>) -> Json<Vec<RegistryEntry>> {
    Json(state.registry.list())
}

pub async fn get_parameter(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<RegistryEntry>, AdminError> {
    Ok(Json(state.registry.get(&name)?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterWrite {
    pub value: String,
    #[serde(default)]
    pub overwrite: bool,
}

pub async fn put_parameter(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(write): Json<ParameterWrite>,
) -> Result<Json<RegistryEntry>, AdminError> {
    let mode = if write.overwrite {
        WriteMode::Overwrite
    } else {
        WriteMode::CreateOnly
    };
    Ok(Json(state.registry.put(&name, &write.value, mode)?))
}

pub async fn put_asset(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    let owner = headers
        .get(X_ASSET_OWNER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| content_type_for(&key).to_string());

    let size = body.len();
    let asset = Asset {
        bytes: body,
        content_type,
        owner,
    };
    state.store.put(&key, asset).await?;
    tracing::info!(key = %key, size, "Asset uploaded via admin API");
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidationRequest {
    pub pattern: String,
}

pub async fn invalidate_cache(
    State(state): State<AdminState>,
    Json(request): Json<InvalidationRequest>,
) -> Result<Json<serde_json::Value>, AdminError> {
    let pattern = PathPattern::parse(request.pattern).map_err(RouteError::from)?;
    let removed = state.edge.invalidate(&pattern);
    Ok(Json(serde_json::json!({ "removed": removed })))
}
