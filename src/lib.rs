//! modelrouter - model routing and provider health for LLM gateways
//!
//! This library decides which `(provider, model)` serves each completion
//! request and which alternate to use when the primary fails. It provides
//! the provider registry, health tracking, routing strategies and the
//! collaborator seams (cost estimation, events, health probes).

pub mod config;
pub mod cost;
pub mod error;
pub mod events;
pub mod registry;
pub mod request;
pub mod router;

pub use config::Config;
pub use cost::{CostEstimate, CostEstimator, TokenCostEstimator};
pub use error::{Error, Result};
pub use events::{EventSink, RouterEvent};
pub use registry::{HealthStatus, ModelInfo, ProviderRegistry};
pub use request::RoutingRequest;
pub use router::{ModelRouter, Route, RoutingDecision, SelectionCriteria, Strategy};
