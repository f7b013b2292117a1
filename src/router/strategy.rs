//! Selection strategies.
//!
//! Every picker takes the candidate list in its construction order and
//! returns an index into it. Ties always resolve to the earliest candidate.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::registry::{HealthStatus, ModelInfo};

/// Added to the combined price so free models get a finite weight.
pub(crate) const WEIGHT_EPSILON: f64 = 1e-6;

/// How a route picks one model out of its candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    CostOptimized,
    LatencyOptimized,
    QualityOptimized,
    RoundRobin,
    Weighted,
    Failover,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CostOptimized => "cost_optimized",
            Strategy::LatencyOptimized => "latency_optimized",
            Strategy::QualityOptimized => "quality_optimized",
            Strategy::RoundRobin => "round_robin",
            Strategy::Weighted => "weighted",
            Strategy::Failover => "failover",
        }
    }

    /// Human-readable reason attached to decisions made by this strategy.
    pub fn reason(&self) -> &'static str {
        match self {
            Strategy::CostOptimized => "Lowest cost model",
            Strategy::LatencyOptimized => "Lowest latency provider",
            Strategy::QualityOptimized => "Highest quality model",
            Strategy::RoundRobin => "Round-robin selection",
            Strategy::Weighted => "Weighted random selection",
            Strategy::Failover => "Healthiest available provider",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cost_optimized" => Ok(Strategy::CostOptimized),
            "latency_optimized" => Ok(Strategy::LatencyOptimized),
            "quality_optimized" => Ok(Strategy::QualityOptimized),
            "round_robin" => Ok(Strategy::RoundRobin),
            "weighted" => Ok(Strategy::Weighted),
            "failover" => Ok(Strategy::Failover),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// A model plus the provider state the strategies rank on.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub model: ModelInfo,
    pub priority: f64,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub error_count: u32,
}

/// Index of the lowest cost. First wins ties.
pub(crate) fn pick_cheapest(costs: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &cost) in costs.iter().enumerate() {
        match best {
            Some((_, best_cost)) if cost >= best_cost => {}
            _ => best = Some((i, cost)),
        }
    }
    best.map(|(i, _)| i)
}

/// Lowest last-observed latency; unknown latency ranks last.
pub(crate) fn pick_lowest_latency(candidates: &[Candidate]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| c.latency_ms.unwrap_or(u64::MAX))
        .map(|(i, _)| i)
}

/// Highest tier, then highest combined price.
pub(crate) fn pick_highest_quality(candidates: &[Candidate]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            b.model.tier.cmp(&a.model.tier).then_with(|| {
                b.model
                    .combined_price_per_1k()
                    .total_cmp(&a.model.combined_price_per_1k())
            })
        })
        .map(|(i, _)| i)
}

/// Healthiest status first, then fewest errors.
pub(crate) fn pick_failover(candidates: &[Candidate]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| failover_order(a, b))
        .map(|(i, _)| i)
}

fn failover_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.status
        .severity_rank()
        .cmp(&a.status.severity_rank())
        .then(a.error_count.cmp(&b.error_count))
}

/// Slot for a round-robin `tick` over `len` candidates.
pub(crate) fn pick_round_robin(tick: usize, len: usize) -> Option<usize> {
    (len > 0).then(|| tick % len)
}

/// priority × 1 / (combined price + ε) for every candidate.
pub(crate) fn weights(candidates: &[Candidate]) -> Vec<f64> {
    candidates
        .iter()
        .map(|c| c.priority * (1.0 / (c.model.combined_price_per_1k() + WEIGHT_EPSILON)))
        .collect()
}

/// Walk `weights`, subtracting from `draw` until it drops to zero or below.
///
/// When rounding leaves a positive remainder after the last weight, the last
/// candidate is returned.
pub(crate) fn pick_weighted(weights: &[f64], draw: f64) -> Option<usize> {
    let last = weights.len().checked_sub(1)?;
    let mut remaining = draw;
    for (i, w) in weights.iter().enumerate() {
        remaining -= w;
        if remaining <= 0.0 {
            return Some(i);
        }
    }
    Some(last)
}
