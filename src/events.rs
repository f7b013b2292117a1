//! Observability side channel.
//!
//! The registry and router publish [`RouterEvent`]s to an optional
//! [`EventSink`]. Emission never blocks and never affects the outcome of the
//! operation that produced the event.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::ProviderConfig;
use crate::registry::{Capability, HealthStatus};
use crate::router::Strategy;

/// Where a fallback decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackSource {
    /// Next entry of the route's explicit fallback chain.
    Chain,
    /// Automatic failover selection over the remaining candidates.
    Auto,
}

/// An event published by the registry or the router.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum RouterEvent {
    #[serde(rename = "provider.registered")]
    ProviderRegistered {
        /// Serializes with the API key redacted.
        provider: ProviderConfig,
        capabilities: Vec<Capability>,
    },
    #[serde(rename = "provider.status_changed")]
    ProviderStatusChanged {
        provider: String,
        from: HealthStatus,
        to: HealthStatus,
    },
    #[serde(rename = "provider.health_check")]
    ProviderHealthCheck {
        provider: String,
        healthy: bool,
        latency_ms: Option<u64>,
        status: HealthStatus,
    },
    #[serde(rename = "route.selected")]
    RouteSelected {
        route_id: Option<String>,
        strategy: Strategy,
        model: String,
        provider: String,
        candidates: Vec<String>,
    },
    #[serde(rename = "route.fallback")]
    RouteFallback {
        route_id: Option<String>,
        failed_model: String,
        model: String,
        provider: String,
        source: FallbackSource,
    },
    #[serde(rename = "route.failed")]
    RouteFailed {
        route_id: Option<String>,
        failed_model: String,
        reason: String,
    },
}

impl RouterEvent {
    /// Dotted event name, identical to the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            RouterEvent::ProviderRegistered { .. } => "provider.registered",
            RouterEvent::ProviderStatusChanged { .. } => "provider.status_changed",
            RouterEvent::ProviderHealthCheck { .. } => "provider.health_check",
            RouterEvent::RouteSelected { .. } => "route.selected",
            RouterEvent::RouteFallback { .. } => "route.fallback",
            RouterEvent::RouteFailed { .. } => "route.failed",
        }
    }

    /// JSON payload of the event.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Receiver of router events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &RouterEvent);
}

impl<F> EventSink for F
where
    F: Fn(&RouterEvent) + Send + Sync,
{
    fn on_event(&self, event: &RouterEvent) {
        self(event)
    }
}

/// Sink that writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn on_event(&self, event: &RouterEvent) {
        match event {
            RouterEvent::RouteFailed {
                failed_model,
                reason,
                ..
            } => {
                tracing::warn!(event = event.name(), failed_model = %failed_model, reason = %reason, "router event");
            }
            _ => {
                tracing::info!(event = event.name(), payload = %event.payload(), "router event");
            }
        }
    }
}

/// Sink that forwards events into an unbounded tokio channel.
///
/// Sends after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<RouterEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RouterEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn on_event(&self, event: &RouterEvent) {
        let _ = self.tx.send(event.clone());
    }
}
