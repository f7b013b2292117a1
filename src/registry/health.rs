//! Per-provider health state machine.
//!
//! Implements the signal-driven lifecycle:
//! - **Unknown**: registered, nothing observed yet
//! - **Available**: last signal was healthy
//! - **Degraded**: error count reached half the threshold
//! - **Unavailable**: error count reached the threshold, never selected
//! - **RateLimited**: forced by an explicit rate-limit signal
//!
//! There is no time-based decay. Recovery happens through successes,
//! healthy probes, or a manual reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live status of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Available,
    Degraded,
    RateLimited,
    Unavailable,
}

impl HealthStatus {
    /// Lowercase string representation for logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Available => "available",
            HealthStatus::Degraded => "degraded",
            HealthStatus::RateLimited => "rate_limited",
            HealthStatus::Unavailable => "unavailable",
        }
    }

    /// Rank used by failover ordering, higher is healthier.
    pub fn severity_rank(&self) -> u8 {
        match self {
            HealthStatus::Available => 3,
            HealthStatus::Degraded => 2,
            HealthStatus::RateLimited => 1,
            HealthStatus::Unknown | HealthStatus::Unavailable => 0,
        }
    }

    /// Whether models of a provider in this status may be routed to.
    pub fn is_selectable(&self) -> bool {
        !matches!(self, HealthStatus::Unavailable)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change produced by one of the record operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthStatus,
    pub to: HealthStatus,
}

/// Health snapshot for a single provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub last_checked: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub error_count: u32,
    /// Ids of models currently bound to this provider.
    pub model_ids: Vec<String>,
}

impl HealthRecord {
    pub(crate) fn new(status: HealthStatus) -> Self {
        Self {
            status,
            latency_ms: None,
            last_checked: None,
            success_count: 0,
            error_count: 0,
            model_ids: Vec::new(),
        }
    }

    fn transition_to(&mut self, status: HealthStatus) -> Option<Transition> {
        if self.status == status {
            return None;
        }
        let from = self.status;
        self.status = status;
        Some(Transition { from, to: status })
    }

    /// Direct status set, as done by health checks and operators.
    pub(crate) fn set_status(
        &mut self,
        status: HealthStatus,
        latency_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        if latency_ms.is_some() {
            self.latency_ms = latency_ms;
        }
        self.last_checked = Some(now);
        self.transition_to(status)
    }

    /// Record a successful call. Each success pays back one error.
    pub(crate) fn record_success(&mut self, latency_ms: u64) -> Option<Transition> {
        self.success_count += 1;
        self.error_count = self.error_count.saturating_sub(1);
        self.latency_ms = Some(latency_ms);

        match self.status {
            HealthStatus::Unknown => self.transition_to(HealthStatus::Available),
            HealthStatus::Degraded | HealthStatus::RateLimited if self.error_count == 0 => {
                self.transition_to(HealthStatus::Available)
            }
            _ => None,
        }
    }

    /// Record a failed call against `threshold` (degraded at half, unavailable at full).
    ///
    /// Errors only ever worsen the status: the degraded step applies from
    /// `unknown` or `available`, so an `unavailable` provider stays put.
    pub(crate) fn record_error(&mut self, rate_limited: bool, threshold: u32) -> Option<Transition> {
        self.error_count += 1;

        if rate_limited {
            return self.transition_to(HealthStatus::RateLimited);
        }

        if self.error_count >= threshold {
            return self.transition_to(HealthStatus::Unavailable);
        }
        match self.status {
            HealthStatus::Unknown | HealthStatus::Available if self.error_count >= threshold / 2 => {
                self.transition_to(HealthStatus::Degraded)
            }
            _ => None,
        }
    }

    /// Zero the error counter. Unavailable and degraded fall back to unknown.
    pub(crate) fn reset_errors(&mut self) -> Option<Transition> {
        self.error_count = 0;
        match self.status {
            HealthStatus::Unavailable | HealthStatus::Degraded => {
                self.transition_to(HealthStatus::Unknown)
            }
            _ => None,
        }
    }
}
