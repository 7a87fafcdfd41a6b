//! Active readiness probing.
//!
//! # Responsibilities
//! - Periodically probe targets that are registered but not live
//! - Promote targets to live on the first successful probe

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::compute::{ComputeService, TargetState};
use crate::config::schema::ReadinessConfig;
use crate::observability::metrics;

/// A target and the URL that reports its readiness.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    pub service: Arc<ComputeService>,
    pub url: String,
}

impl ReadinessProbe {
    pub fn new(service: Arc<ComputeService>, target_url: &str, health_path: &str) -> Self {
        let url = format!(
            "{}/{}",
            target_url.trim_end_matches('/'),
            health_path.trim_start_matches('/')
        );
        Self { service, url }
    }
}

pub struct ReadinessMonitor {
    probes: Vec<ReadinessProbe>,
    config: ReadinessConfig,
    client: Client<HttpConnector, Body>,
}

impl ReadinessMonitor {
    pub fn new(probes: Vec<ReadinessProbe>, config: ReadinessConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            probes,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Readiness probes disabled");
            return;
        }
        if self.probes.is_empty() {
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            targets = self.probes.len(),
            "Readiness monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.check_all().await == 0 {
                        tracing::info!("All targets live, readiness monitor exiting");
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Readiness monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every pending target once. Returns how many are still pending.
    pub async fn check_all(&self) -> usize {
        let mut pending = 0;
        for probe in &self.probes {
            if !matches!(probe.service.state(), TargetState::Registered { .. }) {
                continue;
            }
            if self.probe(probe).await {
                if let Err(e) = probe.service.mark_live() {
                    tracing::warn!(service = probe.service.name(), error = %e, "Could not mark target live");
                }
                metrics::record_target_live(probe.service.name(), true);
            } else {
                metrics::record_target_live(probe.service.name(), false);
                pending += 1;
            }
        }
        pending
    }

    async fn probe(&self, probe: &ReadinessProbe) -> bool {
        let request = match Request::builder()
            .method("GET")
            .uri(probe.url.as_str())
            .header("user-agent", "mfe-router-readiness")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(url = %probe.url, "Failed to build readiness request: {}", e);
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(url = %probe.url, status = %response.status(), "Target not ready");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %probe.url, error = %e, "Readiness probe failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(url = %probe.url, "Readiness probe failed: timeout");
                false
            }
        }
    }
}
