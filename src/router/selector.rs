//! Model selection logic.

use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::route::{Route, RoutingDecision, SelectionCriteria};
use super::strategy::{self, Candidate, Strategy};
use crate::cost::CostEstimator;
use crate::error::{Error, Result};
use crate::events::{EventSink, FallbackSource, RouterEvent};
use crate::registry::{ModelInfo, ProviderRegistry};
use crate::request::RoutingRequest;

/// Router for selecting models.
///
/// Reads the registry and never mutates it. Safe to share across request
/// handlers; the round-robin counter is the only state a call writes.
pub struct ModelRouter {
    registry: Arc<ProviderRegistry>,
    estimator: Arc<dyn CostEstimator>,
    events: Option<Arc<dyn EventSink>>,
    routes: DashMap<String, Route>,
    default_strategy: Strategy,
    round_robin: AtomicUsize,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("routes", &self.routes.len())
            .field("default_strategy", &self.default_strategy)
            .finish()
    }
}

impl ModelRouter {
    /// Create a router over `registry`, pricing candidates with `estimator`.
    pub fn new(registry: Arc<ProviderRegistry>, estimator: Arc<dyn CostEstimator>) -> Self {
        Self {
            registry,
            estimator,
            events: None,
            routes: DashMap::new(),
            default_strategy: Strategy::default(),
            round_robin: AtomicUsize::new(0),
        }
    }

    pub fn with_default_strategy(mut self, strategy: Strategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn default_strategy(&self) -> Strategy {
        self.default_strategy
    }

    fn emit(&self, event: RouterEvent) {
        if let Some(sink) = &self.events {
            sink.on_event(&event);
        }
    }

    // ── Routes ───────────────────────────────────────────────────────

    /// Register (or replace) a route keyed by its id.
    pub fn register_route(&self, route: Route) {
        tracing::info!(route = %route.id, strategy = ?route.strategy, "Registered route");
        self.routes.insert(route.id.clone(), route);
    }

    pub fn unregister_route(&self, route_id: &str) -> bool {
        self.routes.remove(route_id).is_some()
    }

    pub fn get_route(&self, route_id: &str) -> Option<Route> {
        self.routes.get(route_id).map(|r| r.value().clone())
    }

    /// All routes, sorted by id.
    pub fn get_all_routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.routes.iter().map(|r| r.value().clone()).collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        routes
    }

    /// Look up a route. An unknown id behaves like no route at all.
    fn resolve_route(&self, route_id: Option<&str>) -> Option<Route> {
        let id = route_id?;
        let route = self.get_route(id);
        if route.is_none() {
            tracing::warn!(route = %id, "Unknown route, using default criteria");
        }
        route
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Select a model for a request.
    ///
    /// An explicit `request.model` bypasses strategy selection. Otherwise the
    /// strategy comes from `criteria_override`, then the route, then the
    /// router default; the criteria come from `criteria_override` or the route.
    pub fn select_model(
        &self,
        request: &RoutingRequest,
        route_id: Option<&str>,
        criteria_override: Option<&SelectionCriteria>,
    ) -> Result<RoutingDecision> {
        if let Some(model_id) = request.model.as_deref() {
            return self.select_explicit(model_id, request, route_id);
        }

        let route = self.resolve_route(route_id);
        let criteria = match (criteria_override, &route) {
            (Some(criteria), _) => criteria.clone(),
            (None, Some(route)) => route.criteria.clone(),
            (None, None) => SelectionCriteria::default(),
        };
        let strategy = criteria
            .strategy
            .or(route.as_ref().and_then(|r| r.strategy))
            .unwrap_or(self.default_strategy);

        let candidates = self.build_candidates(request, &criteria, None);
        if candidates.is_empty() {
            tracing::warn!(route = ?route_id, strategy = %strategy, "No candidate models for request");
            return Err(Error::ModelNotFound(
                "no model satisfies the request and route criteria".to_string(),
            ));
        }

        let decision = self.apply_strategy(request, route_id, strategy, &candidates)?;
        tracing::debug!(
            route = ?route_id,
            strategy = %strategy,
            model = %decision.model_id,
            provider = %decision.provider_id,
            candidates = candidates.len(),
            "Selected model"
        );
        self.emit(RouterEvent::RouteSelected {
            route_id: route_id.map(str::to_string),
            strategy,
            model: decision.model_id.clone(),
            provider: decision.provider_id.clone(),
            candidates: candidates.iter().map(|c| c.model.id.clone()).collect(),
        });
        Ok(decision)
    }

    fn select_explicit(
        &self,
        model_id: &str,
        request: &RoutingRequest,
        route_id: Option<&str>,
    ) -> Result<RoutingDecision> {
        let model = self
            .registry
            .get_model(model_id)
            .filter(|m| m.enabled)
            .ok_or_else(|| Error::ModelNotFound(model_id.to_string()))?;

        if !self.registry.is_provider_selectable(&model.provider) {
            return Err(Error::ProviderUnavailable {
                provider: model.provider.clone(),
                model: model.id.clone(),
            });
        }

        let estimate = self.estimator.estimate(request, &model)?;
        let latency = self
            .registry
            .provider_health(&model.provider)
            .and_then(|h| h.latency_ms);

        tracing::debug!(model = %model.id, provider = %model.provider, "Explicit model requested");
        Ok(RoutingDecision {
            route_id: route_id.map(str::to_string),
            model_id: model.id,
            provider_id: model.provider,
            strategy: None,
            reason: "Explicitly specified".to_string(),
            estimated_cost_cents: estimate.estimated_cost_cents,
            alternatives: Vec::new(),
            estimated_latency_ms: latency,
        })
    }

    /// Ids of the models a request could be routed to under `criteria`.
    pub fn candidate_models(
        &self,
        request: &RoutingRequest,
        criteria: &SelectionCriteria,
    ) -> Vec<ModelInfo> {
        self.build_candidates(request, criteria, None)
            .into_iter()
            .map(|c| c.model)
            .collect()
    }

    fn build_candidates(
        &self,
        request: &RoutingRequest,
        criteria: &SelectionCriteria,
        exclude_model: Option<&str>,
    ) -> Vec<Candidate> {
        let required = request.inferred_capabilities();
        let mut models = self.registry.get_enabled_models();
        if let Some(excluded) = exclude_model {
            models.retain(|m| m.id != excluded);
        }

        criteria
            .apply(models, &required)
            .into_iter()
            .filter_map(|model| {
                let provider = self.registry.get_provider(&model.provider)?;
                let health = self.registry.provider_health(&model.provider)?;
                if !provider.enabled || !health.status.is_selectable() {
                    return None;
                }
                Some(Candidate {
                    priority: provider.priority,
                    status: health.status,
                    latency_ms: health.latency_ms,
                    error_count: health.error_count,
                    model,
                })
            })
            .collect()
    }

    fn apply_strategy(
        &self,
        request: &RoutingRequest,
        route_id: Option<&str>,
        strategy: Strategy,
        candidates: &[Candidate],
    ) -> Result<RoutingDecision> {
        let mut known_cost = None;
        let index = match strategy {
            Strategy::CostOptimized => {
                let costs = candidates
                    .iter()
                    .map(|c| {
                        self.estimator
                            .estimate(request, &c.model)
                            .map(|e| e.estimated_cost_cents)
                    })
                    .collect::<Result<Vec<f64>>>()?;
                let index = strategy::pick_cheapest(&costs);
                known_cost = index.map(|i| costs[i]);
                index
            }
            Strategy::LatencyOptimized => strategy::pick_lowest_latency(candidates),
            Strategy::QualityOptimized => strategy::pick_highest_quality(candidates),
            Strategy::RoundRobin => {
                let tick = self.round_robin.fetch_add(1, Ordering::Relaxed);
                strategy::pick_round_robin(tick, candidates.len())
            }
            Strategy::Weighted => {
                let weights = strategy::weights(candidates);
                let total: f64 = weights.iter().sum();
                let draw = rand::thread_rng().gen::<f64>() * total;
                strategy::pick_weighted(&weights, draw)
            }
            Strategy::Failover => strategy::pick_failover(candidates),
        };

        let Some(index) = index else {
            return Err(Error::ModelNotFound(
                "no model satisfies the request and route criteria".to_string(),
            ));
        };

        self.decide(
            request,
            route_id,
            Some(strategy),
            strategy.reason().to_string(),
            &candidates[index],
            candidates,
            known_cost,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn decide(
        &self,
        request: &RoutingRequest,
        route_id: Option<&str>,
        strategy: Option<Strategy>,
        reason: String,
        chosen: &Candidate,
        candidates: &[Candidate],
        known_cost: Option<f64>,
    ) -> Result<RoutingDecision> {
        let cost = match known_cost {
            Some(cost) => cost,
            None => {
                self.estimator
                    .estimate(request, &chosen.model)?
                    .estimated_cost_cents
            }
        };

        Ok(RoutingDecision {
            route_id: route_id.map(str::to_string),
            model_id: chosen.model.id.clone(),
            provider_id: chosen.model.provider.clone(),
            strategy,
            reason,
            estimated_cost_cents: cost,
            alternatives: candidates
                .iter()
                .filter(|c| c.model.id != chosen.model.id)
                .map(|c| c.model.id.clone())
                .collect(),
            estimated_latency_ms: chosen.latency_ms,
        })
    }

    // ── Fallback ─────────────────────────────────────────────────────

    /// Pick a replacement after `failed_model_id` failed.
    ///
    /// The route's fallback chain is consulted first: the first usable entry
    /// after the failed model wins, so an unusable next entry is skipped
    /// rather than ending the chain. Without one, a `failover` selection runs
    /// over the remaining candidates. `Ok(None)` means nothing is left.
    pub fn get_fallback(
        &self,
        failed_model_id: &str,
        request: &RoutingRequest,
        route_id: Option<&str>,
    ) -> Result<Option<RoutingDecision>> {
        let route = self.resolve_route(route_id);

        if let Some(route) = &route {
            if let Some(decision) = self.chain_fallback(route, failed_model_id, request)? {
                tracing::info!(
                    route = %route.id,
                    failed = %failed_model_id,
                    model = %decision.model_id,
                    "Falling back along chain"
                );
                self.emit(RouterEvent::RouteFallback {
                    route_id: Some(route.id.clone()),
                    failed_model: failed_model_id.to_string(),
                    model: decision.model_id.clone(),
                    provider: decision.provider_id.clone(),
                    source: FallbackSource::Chain,
                });
                return Ok(Some(decision));
            }
        }

        let criteria = route.map(|r| r.criteria).unwrap_or_default();
        let candidates = self.build_candidates(request, &criteria, Some(failed_model_id));
        let Some(index) = strategy::pick_failover(&candidates) else {
            tracing::warn!(route = ?route_id, failed = %failed_model_id, "No fallback model available");
            self.emit(RouterEvent::RouteFailed {
                route_id: route_id.map(str::to_string),
                failed_model: failed_model_id.to_string(),
                reason: "no fallback candidates remain".to_string(),
            });
            return Ok(None);
        };

        let chosen = &candidates[index];
        let decision = self.decide(
            request,
            route_id,
            Some(Strategy::Failover),
            format!("Fallback from {}: {}", failed_model_id, Strategy::Failover.reason()),
            chosen,
            &candidates,
            None,
        )?;

        tracing::info!(
            route = ?route_id,
            failed = %failed_model_id,
            model = %decision.model_id,
            "Falling back by automatic selection"
        );
        self.emit(RouterEvent::RouteFallback {
            route_id: route_id.map(str::to_string),
            failed_model: failed_model_id.to_string(),
            model: decision.model_id.clone(),
            provider: decision.provider_id.clone(),
            source: FallbackSource::Auto,
        });
        Ok(Some(decision))
    }

    /// Scan the chain forward from the failed entry. Missing or disabled
    /// models and models on unselectable providers are skipped; `None` when
    /// the failed model is not in the chain or nothing usable follows it.
    fn chain_fallback(
        &self,
        route: &Route,
        failed_model_id: &str,
        request: &RoutingRequest,
    ) -> Result<Option<RoutingDecision>> {
        let Some(position) = route
            .fallback_chain
            .iter()
            .position(|m| m == failed_model_id)
        else {
            return Ok(None);
        };

        let remaining = &route.fallback_chain[position + 1..];
        for (offset, next_id) in remaining.iter().enumerate() {
            let Some(model) = self.registry.get_model(next_id).filter(|m| m.enabled) else {
                continue;
            };
            if !self.registry.is_provider_selectable(&model.provider) {
                continue;
            }

            let estimate = self.estimator.estimate(request, &model)?;
            let latency = self
                .registry
                .provider_health(&model.provider)
                .and_then(|h| h.latency_ms);
            return Ok(Some(RoutingDecision {
                route_id: Some(route.id.clone()),
                reason: format!("Fallback chain: {} -> {}", failed_model_id, model.id),
                model_id: model.id,
                provider_id: model.provider,
                strategy: None,
                estimated_cost_cents: estimate.estimated_cost_cents,
                alternatives: remaining[offset + 1..].to_vec(),
                estimated_latency_ms: latency,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::cost::TokenCostEstimator;
    use crate::registry::{Capability, HealthStatus, ModelTier};
    use crate::request::Message;

    fn test_registry() -> Arc<ProviderRegistry> {
        let registry = ProviderRegistry::empty(4).unwrap();
        for id in ["openai", "anthropic"] {
            registry.register_provider(ProviderConfig::new(id)).unwrap();
        }
        registry.register_model(
            ModelInfo::new("cheap", "openai", ModelTier::Economy, 16_000)
                .with_capabilities(&[Capability::Chat, Capability::Streaming])
                .with_pricing(0.0001, 0.0002),
        );
        registry.register_model(
            ModelInfo::new("smart", "anthropic", ModelTier::Flagship, 200_000)
                .with_capabilities(&[Capability::Chat])
                .with_pricing(0.015, 0.075),
        );
        Arc::new(registry)
    }

    fn router() -> ModelRouter {
        ModelRouter::new(test_registry(), Arc::new(TokenCostEstimator::default()))
    }

    fn request() -> RoutingRequest {
        RoutingRequest::new(vec![Message::user("hello")])
    }

    #[test]
    fn test_default_strategy_is_cost() {
        let decision = router().select_model(&request(), None, None).unwrap();
        assert_eq!(decision.model_id, "cheap");
        assert_eq!(decision.strategy, Some(Strategy::CostOptimized));
        assert_eq!(decision.reason, "Lowest cost model");
        assert_eq!(decision.alternatives, vec!["smart".to_string()]);
        assert!(decision.estimated_cost_cents > 0.0);
    }

    #[test]
    fn test_override_beats_route_beats_default() {
        let router = router().with_default_strategy(Strategy::CostOptimized);
        router.register_route(Route::new("quality", Strategy::QualityOptimized));

        let by_route = router
            .select_model(&request(), Some("quality"), None)
            .unwrap();
        assert_eq!(by_route.model_id, "smart");

        let overridden = router
            .select_model(
                &request(),
                Some("quality"),
                Some(&SelectionCriteria::with_strategy(Strategy::CostOptimized)),
            )
            .unwrap();
        assert_eq!(overridden.model_id, "cheap");
    }

    #[test]
    fn test_unknown_route_uses_defaults() {
        let router = router().with_default_strategy(Strategy::QualityOptimized);
        let decision = router
            .select_model(&request(), Some("missing"), None)
            .unwrap();
        assert_eq!(decision.model_id, "smart");
        assert_eq!(decision.strategy, Some(Strategy::QualityOptimized));
        assert_eq!(decision.route_id.as_deref(), Some("missing"));
    }

    #[test]
    fn test_unknown_route_fallback_still_auto_selects() {
        let decision = router()
            .get_fallback("cheap", &request(), Some("missing"))
            .unwrap()
            .unwrap();
        assert_eq!(decision.model_id, "smart");
        assert_eq!(decision.strategy, Some(Strategy::Failover));
    }

    #[test]
    fn test_streaming_requirement_filters() {
        let decision = router()
            .select_model(
                &request().with_stream(true),
                None,
                Some(&SelectionCriteria::with_strategy(Strategy::QualityOptimized)),
            )
            .unwrap();
        assert_eq!(decision.model_id, "cheap");
        assert!(decision.alternatives.is_empty());
    }

    #[test]
    fn test_latency_strategy_uses_provider_latency() {
        let router = router();
        router
            .registry()
            .update_provider_status("anthropic", HealthStatus::Available, Some(80));
        router
            .registry()
            .update_provider_status("openai", HealthStatus::Available, Some(300));

        let decision = router
            .select_model(
                &request(),
                None,
                Some(&SelectionCriteria::with_strategy(Strategy::LatencyOptimized)),
            )
            .unwrap();
        assert_eq!(decision.model_id, "smart");
        assert_eq!(decision.estimated_latency_ms, Some(80));
    }

    #[test]
    fn test_unavailable_provider_never_candidate() {
        let router = router();
        router
            .registry()
            .update_provider_status("openai", HealthStatus::Unavailable, None);
        let ids: Vec<String> = router
            .candidate_models(&request(), &SelectionCriteria::default())
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["smart".to_string()]);
    }

    #[test]
    fn test_explicit_model_ignores_criteria() {
        let decision = router()
            .select_model(
                &request().with_model("smart"),
                None,
                Some(&SelectionCriteria {
                    max_tier: Some(ModelTier::Economy),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(decision.model_id, "smart");
        assert_eq!(decision.reason, "Explicitly specified");
        assert!(decision.alternatives.is_empty());
        assert_eq!(decision.strategy, None);
    }

    #[test]
    fn test_explicit_model_errors() {
        let router = router();
        let err = router
            .select_model(&request().with_model("nope"), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)));

        router
            .registry()
            .update_provider_status("anthropic", HealthStatus::Unavailable, None);
        let err = router
            .select_model(&request().with_model("smart"), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { .. }));
    }

    #[test]
    fn test_fallback_without_route_uses_failover() {
        let router = router();
        let decision = router
            .get_fallback("cheap", &request(), None)
            .unwrap()
            .unwrap();
        assert_eq!(decision.model_id, "smart");
        assert_eq!(decision.strategy, Some(Strategy::Failover));
        assert!(decision.reason.starts_with("Fallback from cheap"));
    }

    #[test]
    fn test_route_crud() {
        let router = router();
        router.register_route(Route::new("b", Strategy::Weighted));
        router.register_route(Route::new("a", Strategy::Failover));
        let ids: Vec<String> = router.get_all_routes().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        assert!(router.unregister_route("a"));
        assert!(!router.unregister_route("a"));
        assert!(router.get_route("a").is_none());
    }
}
