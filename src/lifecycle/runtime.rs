//! Listener and background task supervision.
//!
//! # Responsibilities
//! - Bind the edge, router and (optionally) admin listeners
//! - Spawn the cache sweeper and readiness monitor
//! - Stop everything through one `Shutdown`

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::schema::MfeConfig;
use crate::edge::run_sweeper;
use crate::health::{ReadinessMonitor, ReadinessProbe};
use crate::http::{edge_app, router_app, serve};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::startup::{bootstrap, BootstrapError, Deployment};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("failed to bind {listener} listener on {address}: {source}")]
    Bind {
        listener: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bootstrapped deployment with its listeners running.
#[derive(Debug)]
pub struct RunningApp {
    pub edge_addr: SocketAddr,
    pub router_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub deployment: Deployment,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningApp {
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Trigger shutdown and wait for every task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Task ended abnormally");
            }
        }
    }
}

async fn bind(listener: &'static str, address: &str) -> Result<TcpListener, RuntimeError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| RuntimeError::Bind {
            listener,
            address: address.to_string(),
            source,
        })
}

fn local_addr(listener: &'static str, socket: &TcpListener, address: &str) -> Result<SocketAddr, RuntimeError> {
    socket.local_addr().map_err(|source| RuntimeError::Bind {
        listener,
        address: address.to_string(),
        source,
    })
}

fn spawn_server(
    tasks: &mut Vec<JoinHandle<()>>,
    listener: TcpListener,
    app: axum::Router,
    name: &'static str,
    shutdown: &Shutdown,
) {
    let shutdown = shutdown.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = serve(listener, app, name, shutdown).await {
            tracing::error!(listener = name, error = %e, "HTTP server failed");
        }
    }));
}

/// Bootstrap the deployment and start serving.
pub async fn start(config: &MfeConfig, base_dir: &Path) -> Result<RunningApp, RuntimeError> {
    let deployment = bootstrap(config, base_dir).await?;
    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let router_listener = bind("router", &config.router.bind_address).await?;
    let router_addr = local_addr("router", &router_listener, &config.router.bind_address)?;
    let edge_listener = bind("edge", &config.edge.bind_address).await?;
    let edge_addr = local_addr("edge", &edge_listener, &config.edge.bind_address)?;

    spawn_server(
        &mut tasks,
        router_listener,
        router_app(deployment.shared.router.clone(), &config.timeouts),
        "router",
        &shutdown,
    );
    spawn_server(
        &mut tasks,
        edge_listener,
        edge_app(deployment.edge.clone(), &config.timeouts),
        "edge",
        &shutdown,
    );

    let admin_addr = if config.admin.enabled {
        let listener = bind("admin", &config.admin.bind_address).await?;
        let addr = local_addr("admin", &listener, &config.admin.bind_address)?;
        let state = AdminState::from_deployment(
            &deployment,
            &config.admin.api_key,
            Duration::from_secs(config.timeouts.connect_secs),
        );
        spawn_server(&mut tasks, listener, setup_admin_router(state, &config.admin), "admin", &shutdown);
        Some(addr)
    } else {
        None
    };

    let sweeper = run_sweeper(
        deployment.edge.cache(),
        Duration::from_secs(config.edge.cache_sweep_secs),
        shutdown.subscribe(),
    );
    tasks.push(tokio::spawn(sweeper));

    let probes = deployment
        .services
        .iter()
        .filter_map(|deployed| {
            deployed.config.health_path.as_deref().map(|path| {
                ReadinessProbe::new(deployed.service.clone(), &deployed.config.target_url, path)
            })
        })
        .collect();
    let monitor = ReadinessMonitor::new(probes, config.readiness.clone());
    tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    tracing::info!(
        edge = %edge_addr,
        router = %router_addr,
        admin = ?admin_addr,
        services = deployment.services.len(),
        "Dispatcher running"
    );

    Ok(RunningApp {
        edge_addr,
        router_addr,
        admin_addr,
        deployment,
        shutdown,
        tasks,
    })
}
