//! Router module for model selection.
//!
//! This module turns a loosely specified request into a concrete
//! `(provider, model)` pair based on:
//! - Capabilities implied by the request and required by the route
//! - Tier, cost, context and provider filters
//! - The route's selection strategy and fallback chain
//! - Live provider health from the registry

mod route;
mod selector;
mod strategy;

pub use route::{Route, RoutingDecision, SelectionCriteria};
pub use selector::ModelRouter;
pub use strategy::{Candidate, Strategy};
