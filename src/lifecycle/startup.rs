//! Startup orchestration.
//!
//! # Responsibilities
//! - Provision the shared stack: asset store and router, handles into the registry
//! - Deploy each page service strictly after, discovering the stack by key
//! - Assemble the edge distribution in front of both origins
//!
//! # Design Decisions
//! - Fail fast: a missing or unresolvable handle stops that service's deploy
//! - Services deploy in configured order, not concurrently
//! - Handles are opaque strings; only the `Infrastructure` directory resolves them

use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::assets::{self, AssetError, AssetPublisher, AssetStore, PublishOptions, PublishReport};
use crate::compute::{ComputeService, HttpTarget, LifecycleError, Upstream, UpstreamError};
use crate::config::schema::{MfeConfig, RegistryConfig, ServiceConfig};
use crate::edge::{BindingError, BindingSet, EdgeDistribution};
use crate::registry::{self, ParameterStore, RegistryError, WriteMode};
use crate::routing::{PathPattern, PatternError, Router};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Assets(#[from] AssetError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Bindings(#[from] BindingError),
    #[error("service `{service}` cannot discover `{key}`: {source}")]
    Discovery {
        service: String,
        key: String,
        #[source]
        source: RegistryError,
    },
    #[error("no {kind} is attached under handle `{handle}`")]
    UnknownHandle { kind: &'static str, handle: String },
}

/// Handle published for an asset store.
pub fn store_handle(bucket: &str) -> String {
    format!("mfe:store:{}", bucket)
}

/// Handle published for a router.
pub fn router_handle(bind_address: &str) -> String {
    format!("mfe:router:{}", bind_address)
}

/// Resolves registry handles to live in-process objects.
#[derive(Debug, Default)]
pub struct Infrastructure {
    stores: DashMap<String, Arc<dyn AssetStore>>,
    routers: DashMap<String, Arc<Router>>,
}

impl Infrastructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_store(&self, handle: impl Into<String>, store: Arc<dyn AssetStore>) {
        self.stores.insert(handle.into(), store);
    }

    pub fn attach_router(&self, handle: impl Into<String>, router: Arc<Router>) {
        self.routers.insert(handle.into(), router);
    }

    pub fn resolve_store(&self, handle: &str) -> Result<Arc<dyn AssetStore>, BootstrapError> {
        self.stores
            .get(handle)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BootstrapError::UnknownHandle {
                kind: "asset store",
                handle: handle.to_string(),
            })
    }

    pub fn resolve_router(&self, handle: &str) -> Result<Arc<Router>, BootstrapError> {
        self.routers
            .get(handle)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BootstrapError::UnknownHandle {
                kind: "router",
                handle: handle.to_string(),
            })
    }
}

/// The shared store and router every page service attaches to.
#[derive(Debug, Clone)]
pub struct SharedStack {
    pub store: Arc<dyn AssetStore>,
    pub router: Arc<Router>,
    pub generation: u64,
}

/// Create the shared stack and publish its handles.
pub fn provision_shared(
    config: &MfeConfig,
    registry: &dyn ParameterStore,
    infra: &Infrastructure,
) -> Result<SharedStack, BootstrapError> {
    let generation = registry.begin_generation()?;

    let store = assets::open(&config.assets)?;
    let router = Arc::new(Router::new(
        config.router.default_action.to_fixed_response(),
        Duration::from_secs(config.timeouts.target_secs),
    ));

    let store_handle = store_handle(&config.assets.bucket_name);
    let router_handle = router_handle(&config.router.bind_address);
    infra.attach_store(store_handle.clone(), store.clone());
    infra.attach_router(router_handle.clone(), router.clone());

    registry.put(&config.registry.store_handle_key, &store_handle, WriteMode::CreateOnly)?;
    registry.put(&config.registry.router_handle_key, &router_handle, WriteMode::CreateOnly)?;

    tracing::info!(
        generation,
        store = %store_handle,
        router = %router_handle,
        "Shared stack provisioned"
    );

    Ok(SharedStack {
        store,
        router,
        generation,
    })
}

/// A page service after deploy.
#[derive(Debug)]
pub struct DeployedService {
    pub service: Arc<ComputeService>,
    pub config: ServiceConfig,
    pub reports: Vec<PublishReport>,
}

/// Discover the shared stack, publish assets and register the route.
///
/// Relative `source_dir`s are resolved against `base_dir`.
pub async fn deploy_service(
    config: &ServiceConfig,
    target: Arc<dyn Upstream>,
    keys: &RegistryConfig,
    registry: &dyn ParameterStore,
    infra: &Infrastructure,
    base_dir: &Path,
) -> Result<DeployedService, BootstrapError> {
    let discover = |key: &str| {
        registry
            .get_value(key)
            .map_err(|source| BootstrapError::Discovery {
                service: config.name.clone(),
                key: key.to_string(),
                source,
            })
    };
    let store = infra.resolve_store(&discover(&keys.store_handle_key)?)?;
    let router = infra.resolve_router(&discover(&keys.router_handle_key)?)?;

    // Claim the route first so a rejected service never touches the shared namespace.
    let pattern = PathPattern::parse(config.path_pattern.clone())?;
    let service = Arc::new(ComputeService::new(config.name.clone(), target));
    service.register(&router, pattern, config.priority)?;

    let publisher = AssetPublisher::new(store, config.name.clone());
    let reports = match publish_assets(&publisher, config, base_dir).await {
        Ok(reports) => reports,
        Err(e) => {
            if let Err(rollback) = service.deregister(&router) {
                tracing::error!(service = %config.name, error = %rollback, "Route rollback failed");
            }
            return Err(e.into());
        }
    };

    if config.health_path.is_none() {
        service.mark_live()?;
    }

    tracing::info!(
        service = %config.name,
        pattern = %config.path_pattern,
        priority = config.priority,
        asset_sets = reports.len(),
        "Page service deployed"
    );

    Ok(DeployedService {
        service,
        config: config.clone(),
        reports,
    })
}

async fn publish_assets(
    publisher: &AssetPublisher,
    config: &ServiceConfig,
    base_dir: &Path,
) -> Result<Vec<PublishReport>, AssetError> {
    let mut reports = Vec::with_capacity(config.assets.len());
    for asset in &config.assets {
        let dir = base_dir.join(&asset.source_dir);
        let options = PublishOptions { prune: asset.prune };
        reports.push(publisher.publish_dir(&dir, &asset.destination_prefix, options).await?);
    }
    Ok(reports)
}

/// Everything `main` needs to serve traffic.
#[derive(Debug)]
pub struct Deployment {
    pub registry: Arc<dyn ParameterStore>,
    pub infra: Arc<Infrastructure>,
    pub shared: SharedStack,
    pub services: Vec<DeployedService>,
    pub edge: Arc<EdgeDistribution>,
}

/// Provision, deploy every configured service, then build the edge.
pub async fn bootstrap(config: &MfeConfig, base_dir: &Path) -> Result<Deployment, BootstrapError> {
    let registry = registry::open(&config.registry)?;
    let infra = Arc::new(Infrastructure::new());
    let shared = provision_shared(config, registry.as_ref(), &infra)?;
    let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

    let mut services = Vec::with_capacity(config.services.len());
    for service in &config.services {
        let target = Arc::new(HttpTarget::new(&service.target_url, connect_timeout)?);
        services.push(
            deploy_service(service, target, &config.registry, registry.as_ref(), &infra, base_dir)
                .await?,
        );
    }

    let bindings = BindingSet::from_config(&config.edge.bindings)?;
    let dynamic: Arc<dyn Upstream> = match &config.edge.dynamic_origin {
        Some(url) => Arc::new(HttpTarget::new(url, connect_timeout)?),
        None => shared.router.clone(),
    };
    let edge = Arc::new(EdgeDistribution::new(bindings, shared.store.clone(), dynamic));

    Ok(Deployment {
        registry,
        infra,
        shared,
        services,
        edge,
    })
}
