//! Health probing seam and the interval driver.
//!
//! The registry does not know how to reach a provider. Callers inject a
//! [`HealthProbe`]; [`HealthCheckScheduler`] runs it on a fixed cadence in a
//! tokio task until stopped through its handle.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::health::HealthStatus;
use super::providers::ProviderRegistry;

/// Result of probing one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy { latency_ms: u64 },
    Unhealthy { rate_limited: bool, reason: String },
}

/// Liveness probe for a provider. Any timeout belongs to the implementation.
pub trait HealthProbe: Send + Sync {
    fn probe(&self, provider_id: &str) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Per-provider line of a health-check pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckReport {
    pub provider: String,
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    /// Status after the probe result was applied.
    pub status: HealthStatus,
}

/// Spawns the periodic health-check loop.
pub struct HealthCheckScheduler;

impl HealthCheckScheduler {
    /// Run `registry.run_health_checks(probe)` every `interval`, first pass immediately.
    pub fn start<P>(
        registry: Arc<ProviderRegistry>,
        probe: Arc<P>,
        interval: Duration,
    ) -> HealthCheckHandle
    where
        P: HealthProbe + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_ms = period.as_millis() as u64, "health checks started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reports = registry.run_health_checks(probe.as_ref()).await;
                        let unhealthy = reports.iter().filter(|r| !r.healthy).count();
                        tracing::debug!(probed = reports.len(), unhealthy, "health check pass complete");
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("health checks stopped");
        });

        HealthCheckHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owner handle for a running health-check loop.
pub struct HealthCheckHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HealthCheckHandle {
    /// Signal the loop to stop and wait for the in-flight pass to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "health check task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
