//! Concurrent provider and model registry.
//!
//! Providers and models live in [`DashMap`]s, so a health update for one
//! provider only locks that provider's shard and is visible to every
//! subsequent read. Events are published after all map guards are dropped.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::catalog::{default_models, known_provider_capabilities};
use super::health::{HealthRecord, HealthStatus, Transition};
use super::probe::{HealthCheckReport, HealthProbe, ProbeOutcome};
use super::types::{Capability, ModelInfo};
use crate::config::{Config, ProviderConfig};
use crate::error::{Error, Result};
use crate::events::{EventSink, RouterEvent};

struct ProviderEntry {
    config: ProviderConfig,
    capabilities: &'static [Capability],
    health: HealthRecord,
}

struct ModelEntry {
    /// Registration sequence, keeps listings in insertion order.
    seq: u64,
    model: ModelInfo,
}

/// Options for [`ProviderRegistry::find_best_model`].
#[derive(Debug, Clone, Default)]
pub struct FindModelOptions {
    /// Narrow to these providers, unless that would leave nothing.
    pub preferred_providers: Vec<String>,
    /// Upper bound on input + output price per 1000 tokens.
    pub max_cost_per_1k: Option<f64>,
}

/// Catalog of providers and models plus per-provider health.
///
/// The registry is the only component that mutates health state.
pub struct ProviderRegistry {
    providers: DashMap<String, ProviderEntry>,
    models: DashMap<String, ModelEntry>,
    next_seq: AtomicU64,
    error_threshold: u32,
    events: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.len())
            .field("models", &self.models.len())
            .field("error_threshold", &self.error_threshold)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a registry seeded with the default model catalog.
    pub fn new(error_threshold: u32) -> Result<Self> {
        let registry = Self::empty(error_threshold)?;
        for model in default_models() {
            registry.register_model(model);
        }
        Ok(registry)
    }

    /// Create a registry with no models.
    pub fn empty(error_threshold: u32) -> Result<Self> {
        if error_threshold < 2 {
            return Err(Error::Validation(format!(
                "error_threshold must be at least 2, got {}",
                error_threshold
            )));
        }
        Ok(Self {
            providers: DashMap::new(),
            models: DashMap::new(),
            next_seq: AtomicU64::new(0),
            error_threshold,
            events: None,
        })
    }

    /// Attach an event sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Build a registry from configuration: catalog, providers, then models.
    pub fn from_config(config: &Config, sink: Option<Arc<dyn EventSink>>) -> Result<Self> {
        let threshold = config.router.error_threshold;
        let mut registry = if config.router.seed_default_catalog {
            Self::new(threshold)?
        } else {
            Self::empty(threshold)?
        };
        registry.events = sink;

        for provider in &config.providers {
            registry.register_provider(provider.clone())?;
        }
        for model in &config.models {
            registry.register_model(model.clone());
        }
        Ok(registry)
    }

    pub fn error_threshold(&self) -> u32 {
        self.error_threshold
    }

    fn emit(&self, event: RouterEvent) {
        if let Some(sink) = &self.events {
            sink.on_event(&event);
        }
    }

    fn emit_transition(&self, provider_id: &str, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        match to {
            HealthStatus::Unavailable | HealthStatus::Degraded | HealthStatus::RateLimited => {
                tracing::warn!(provider = %provider_id, from = %from, to = %to, "provider status changed");
            }
            _ => {
                tracing::info!(provider = %provider_id, from = %from, to = %to, "provider status changed");
            }
        }
        self.emit(RouterEvent::ProviderStatusChanged {
            provider: provider_id.to_string(),
            from,
            to,
        });
    }

    // ── Providers ────────────────────────────────────────────────────

    /// Register (or replace) a provider.
    ///
    /// Fails with a validation error for identifiers missing from the
    /// known-provider table. Health starts `unknown`, or `unavailable` for a
    /// disabled provider.
    pub fn register_provider(&self, config: ProviderConfig) -> Result<()> {
        let Some(capabilities) = known_provider_capabilities(&config.id) else {
            return Err(Error::Validation(format!("Unknown provider '{}'", config.id)));
        };

        let initial = if config.enabled {
            HealthStatus::Unknown
        } else {
            HealthStatus::Unavailable
        };
        let id = config.id.clone();
        let event = RouterEvent::ProviderRegistered {
            provider: config.clone(),
            capabilities: capabilities.to_vec(),
        };
        self.providers.insert(
            id.clone(),
            ProviderEntry {
                config,
                capabilities,
                health: HealthRecord::new(initial),
            },
        );

        // Adopt after insert: models registered concurrently either see the
        // entry and bind themselves, or show up in this scan.
        let bound: Vec<String> = self
            .models_matching(|m| m.provider == id)
            .into_iter()
            .map(|m| m.id)
            .collect();
        let (enabled, priority, models) = match self.providers.get_mut(&id) {
            Some(mut entry) => {
                for model_id in bound {
                    if !entry.health.model_ids.contains(&model_id) {
                        entry.health.model_ids.push(model_id);
                    }
                }
                (
                    entry.config.enabled,
                    entry.config.priority,
                    entry.health.model_ids.len(),
                )
            }
            None => return Ok(()),
        };

        tracing::info!(
            provider = %id,
            enabled,
            priority,
            models,
            "Registered provider"
        );
        self.emit(event);
        Ok(())
    }

    /// Remove a provider and its health record. Its models stay registered.
    pub fn unregister_provider(&self, provider_id: &str) -> bool {
        let removed = self.providers.remove(provider_id).is_some();
        if removed {
            tracing::info!(provider = %provider_id, "Unregistered provider");
        }
        removed
    }

    pub fn get_provider(&self, provider_id: &str) -> Option<ProviderConfig> {
        self.providers
            .get(provider_id)
            .map(|entry| entry.config.clone())
    }

    /// All registered providers, sorted by id.
    pub fn get_all_providers(&self) -> Vec<ProviderConfig> {
        let mut providers: Vec<ProviderConfig> = self
            .providers
            .iter()
            .map(|entry| entry.config.clone())
            .collect();
        providers.sort_by(|a, b| a.id.cmp(&b.id));
        providers
    }

    pub fn provider_capabilities(&self, provider_id: &str) -> Option<Vec<Capability>> {
        self.providers
            .get(provider_id)
            .map(|entry| entry.capabilities.to_vec())
    }

    pub fn provider_health(&self, provider_id: &str) -> Option<HealthRecord> {
        self.providers
            .get(provider_id)
            .map(|entry| entry.health.clone())
    }

    /// Health of every provider, sorted by provider id.
    pub fn all_health(&self) -> Vec<(String, HealthRecord)> {
        let mut all: Vec<(String, HealthRecord)> = self
            .providers
            .iter()
            .map(|entry| (entry.key().clone(), entry.health.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Registered, enabled and not `unavailable`.
    pub fn is_provider_selectable(&self, provider_id: &str) -> bool {
        self.providers
            .get(provider_id)
            .is_some_and(|entry| entry.config.enabled && entry.health.status.is_selectable())
    }

    // ── Health signals ───────────────────────────────────────────────

    /// Set a provider's status directly and stamp the check time.
    ///
    /// An event is only emitted when the status actually changes.
    pub fn update_provider_status(
        &self,
        provider_id: &str,
        status: HealthStatus,
        latency_ms: Option<u64>,
    ) {
        let transition = match self.providers.get_mut(provider_id) {
            Some(mut entry) => entry.health.set_status(status, latency_ms, Utc::now()),
            None => {
                tracing::debug!(provider = %provider_id, "status update for unknown provider ignored");
                return;
            }
        };
        self.emit_transition(provider_id, transition);
    }

    /// Record a successful call.
    pub fn record_success(&self, provider_id: &str, latency_ms: u64) {
        let transition = match self.providers.get_mut(provider_id) {
            Some(mut entry) => entry.health.record_success(latency_ms),
            None => return,
        };
        tracing::debug!(provider = %provider_id, latency_ms, "success recorded");
        self.emit_transition(provider_id, transition);
    }

    /// Record a failed call. A rate-limit signal forces `rate_limited`.
    pub fn record_error(&self, provider_id: &str, rate_limited: bool) {
        let threshold = self.error_threshold;
        let (transition, errors) = match self.providers.get_mut(provider_id) {
            Some(mut entry) => {
                let transition = entry.health.record_error(rate_limited, threshold);
                (transition, entry.health.error_count)
            }
            None => return,
        };
        tracing::debug!(
            provider = %provider_id,
            error_count = errors,
            threshold,
            rate_limited,
            "error recorded"
        );
        self.emit_transition(provider_id, transition);
    }

    /// Zero the error counter; `unavailable`/`degraded` fall back to `unknown`.
    pub fn reset_errors(&self, provider_id: &str) {
        let transition = match self.providers.get_mut(provider_id) {
            Some(mut entry) => entry.health.reset_errors(),
            None => return,
        };
        tracing::info!(provider = %provider_id, "error counter reset");
        self.emit_transition(provider_id, transition);
    }

    /// Providers a health check should probe: registered and enabled.
    fn health_check_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .providers
            .iter()
            .filter(|entry| entry.config.enabled)
            .map(|entry| entry.key().clone())
            .collect();
        targets.sort();
        targets
    }

    /// Probe every enabled provider concurrently and feed the results back.
    ///
    /// Targets are all enabled providers, not only `available` ones, so
    /// `unknown` providers get promoted and `unavailable` ones can recover.
    /// Healthy probes set `available`; unhealthy ones count as an error.
    pub async fn run_health_checks<P>(&self, probe: &P) -> Vec<HealthCheckReport>
    where
        P: HealthProbe,
    {
        let targets = self.health_check_targets();
        let probes: Vec<_> = targets.iter().map(|id| probe.probe(id)).collect();
        let outcomes = futures::future::join_all(probes).await;

        let mut reports = Vec::with_capacity(targets.len());
        for (provider_id, outcome) in targets.into_iter().zip(outcomes) {
            let (healthy, latency_ms) = match &outcome {
                ProbeOutcome::Healthy { latency_ms } => {
                    self.update_provider_status(
                        &provider_id,
                        HealthStatus::Available,
                        Some(*latency_ms),
                    );
                    (true, Some(*latency_ms))
                }
                ProbeOutcome::Unhealthy {
                    rate_limited,
                    reason,
                } => {
                    tracing::warn!(provider = %provider_id, reason = %reason, "health check failed");
                    self.record_error(&provider_id, *rate_limited);
                    (false, None)
                }
            };

            // Provider may have been unregistered while the probe was in flight.
            let Some(status) = self.provider_health(&provider_id).map(|h| h.status) else {
                continue;
            };
            self.emit(RouterEvent::ProviderHealthCheck {
                provider: provider_id.clone(),
                healthy,
                latency_ms,
                status,
            });
            reports.push(HealthCheckReport {
                provider: provider_id,
                healthy,
                latency_ms,
                status,
            });
        }
        reports
    }

    // ── Models ───────────────────────────────────────────────────────

    /// Register (or replace) a model and bind it to its provider's health record.
    pub fn register_model(&self, model: ModelInfo) {
        let id = model.id.clone();
        let provider_id = model.provider.clone();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let previous = self.models.insert(id.clone(), ModelEntry { seq, model });
        if let Some(old) = previous {
            if old.model.provider != provider_id {
                self.unbind_model(&old.model.provider, &id);
            }
        }

        if let Some(mut entry) = self.providers.get_mut(&provider_id) {
            if !entry.health.model_ids.contains(&id) {
                entry.health.model_ids.push(id.clone());
            }
        }
        tracing::debug!(model = %id, provider = %provider_id, "Registered model");
    }

    /// Remove a model and unbind it from its provider.
    pub fn unregister_model(&self, model_id: &str) -> bool {
        match self.models.remove(model_id) {
            Some((_, entry)) => {
                self.unbind_model(&entry.model.provider, model_id);
                tracing::debug!(model = %model_id, "Unregistered model");
                true
            }
            None => false,
        }
    }

    fn unbind_model(&self, provider_id: &str, model_id: &str) {
        if let Some(mut entry) = self.providers.get_mut(provider_id) {
            entry.health.model_ids.retain(|m| m != model_id);
        }
    }

    pub fn get_model(&self, model_id: &str) -> Option<ModelInfo> {
        self.models.get(model_id).map(|entry| entry.model.clone())
    }

    /// Models matching `predicate`, in registration order.
    fn models_matching<F>(&self, predicate: F) -> Vec<ModelInfo>
    where
        F: Fn(&ModelInfo) -> bool,
    {
        let mut matching: Vec<(u64, ModelInfo)> = self
            .models
            .iter()
            .filter(|entry| predicate(&entry.model))
            .map(|entry| (entry.seq, entry.model.clone()))
            .collect();
        matching.sort_by_key(|(seq, _)| *seq);
        matching.into_iter().map(|(_, model)| model).collect()
    }

    pub fn get_all_models(&self) -> Vec<ModelInfo> {
        self.models_matching(|_| true)
    }

    pub fn get_models_for_provider(&self, provider_id: &str) -> Vec<ModelInfo> {
        self.models_matching(|m| m.provider == provider_id)
    }

    /// Models that are enabled and whose provider is registered and enabled.
    ///
    /// Health is not consulted here.
    pub fn get_enabled_models(&self) -> Vec<ModelInfo> {
        self.models_matching(|m| {
            m.enabled
                && self
                    .providers
                    .get(&m.provider)
                    .is_some_and(|entry| entry.config.enabled)
        })
    }

    /// Best selectable model offering `capability`.
    ///
    /// Ranks by tier (flagship first), then by ascending combined price.
    pub fn find_best_model(
        &self,
        capability: Capability,
        options: &FindModelOptions,
    ) -> Option<ModelInfo> {
        let mut candidates: Vec<ModelInfo> = self
            .get_enabled_models()
            .into_iter()
            .filter(|m| m.has_capability(capability))
            .filter(|m| self.is_provider_selectable(&m.provider))
            .collect();

        if !options.preferred_providers.is_empty() {
            let preferred: Vec<ModelInfo> = candidates
                .iter()
                .filter(|m| options.preferred_providers.contains(&m.provider))
                .cloned()
                .collect();
            if !preferred.is_empty() {
                candidates = preferred;
            }
        }

        if let Some(max_cost) = options.max_cost_per_1k {
            candidates.retain(|m| m.combined_price_per_1k() <= max_cost);
        }

        candidates.sort_by(|a, b| {
            b.tier.cmp(&a.tier).then(
                a.combined_price_per_1k()
                    .total_cmp(&b.combined_price_per_1k()),
            )
        });
        candidates.into_iter().next()
    }
}
