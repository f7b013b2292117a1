//! Route definitions and the decisions produced from them.

use serde::{Deserialize, Serialize};

use super::strategy::Strategy;
use crate::registry::{Capability, ModelInfo, ModelTier};

/// Filters narrowing the candidate set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionCriteria {
    /// Takes precedence over the route's strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    /// Required on top of what the request shape implies
    pub required_capabilities: Vec<Capability>,
    pub min_tier: Option<ModelTier>,
    pub max_tier: Option<ModelTier>,
    /// Upper bound on input + output price per 1000 tokens
    pub max_cost_per_1k: Option<f64>,
    pub min_context_window: Option<u32>,
    /// Soft allow-list: ignored when nothing would survive it
    pub preferred_providers: Vec<String>,
    pub excluded_providers: Vec<String>,
    /// Hard allow-list of model ids
    pub allowed_models: Vec<String>,
}

impl SelectionCriteria {
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            strategy: Some(strategy),
            ..Default::default()
        }
    }

    /// Apply every filter except provider health, in the documented order.
    ///
    /// `required` must already contain the inferred request capabilities;
    /// the criteria's own capabilities are added here.
    pub(crate) fn apply(&self, models: Vec<ModelInfo>, required: &[Capability]) -> Vec<ModelInfo> {
        let mut candidates: Vec<ModelInfo> = models
            .into_iter()
            .filter(|m| m.has_all(required) && m.has_all(&self.required_capabilities))
            .collect();

        if let Some(min) = self.min_tier {
            candidates.retain(|m| m.tier >= min);
        }
        if let Some(max) = self.max_tier {
            candidates.retain(|m| m.tier <= max);
        }
        if let Some(max_cost) = self.max_cost_per_1k {
            candidates.retain(|m| m.combined_price_per_1k() <= max_cost);
        }
        if let Some(min_ctx) = self.min_context_window {
            candidates.retain(|m| m.context_window >= min_ctx);
        }

        if !self.preferred_providers.is_empty() {
            let preferred: Vec<ModelInfo> = candidates
                .iter()
                .filter(|m| self.preferred_providers.contains(&m.provider))
                .cloned()
                .collect();
            if !preferred.is_empty() {
                candidates = preferred;
            }
        }

        if !self.excluded_providers.is_empty() {
            candidates.retain(|m| !self.excluded_providers.contains(&m.provider));
        }
        if !self.allowed_models.is_empty() {
            candidates.retain(|m| self.allowed_models.contains(&m.id));
        }

        candidates
    }
}

/// A named routing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Falls back to the router default when absent
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub criteria: SelectionCriteria,
    /// Model ids tried in order after a failure
    #[serde(default)]
    pub fallback_chain: Vec<String>,
}

impl Route {
    pub fn new(id: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            id: id.into(),
            description: None,
            strategy: Some(strategy),
            criteria: SelectionCriteria::default(),
            fallback_chain: Vec::new(),
        }
    }

    pub fn with_criteria(mut self, criteria: SelectionCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_fallback_chain<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_chain = chain.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of a routing call. Produced fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    pub model_id: String,
    pub provider_id: String,
    /// Absent for explicit models and fallback-chain hops
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    pub reason: String,
    pub estimated_cost_cents: f64,
    /// Candidates that were considered but not chosen
    pub alternatives: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_latency_ms: Option<u64>,
}
