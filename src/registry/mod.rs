//! Provider registry module.
//!
//! This module owns everything the router reads about backends:
//! - Provider catalog and the known-provider capability table
//! - Model catalog, each model bound to one provider
//! - Per-provider health state driven by success/error signals and probes

mod catalog;
mod health;
mod probe;
mod providers;
mod types;

pub use catalog::{default_models, known_provider_capabilities, known_provider_ids};
pub use health::{HealthRecord, HealthStatus, Transition};
pub use probe::{HealthCheckHandle, HealthCheckReport, HealthCheckScheduler, HealthProbe, ProbeOutcome};
pub use providers::{FindModelOptions, ProviderRegistry};
pub use types::{Capability, ModelInfo, ModelTier};
