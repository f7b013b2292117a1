//! Integration tests for model selection and fallback.
//!
//! Verifies that:
//! - The end-to-end cost-optimized scenario picks the only viable model
//! - Explicit models bypass strategies and surface the right errors
//! - Adding criteria never grows the candidate set
//! - Round-robin cycles through a static candidate set in order
//! - Weighted selection splits evenly between equal weights
//! - Fallback chains are walked in order before automatic failover
//! - An exhausted fallback reports nothing and emits `route.failed`

use std::collections::HashMap;
use std::sync::Arc;

use modelrouter::config::ProviderConfig;
use modelrouter::events::{ChannelEventSink, FallbackSource, RouterEvent};
use modelrouter::registry::{Capability, HealthStatus, ModelInfo, ModelTier, ProviderRegistry};
use modelrouter::request::{ContentPart, ImageUrl, Message, ResponseFormat, ToolDefinition};
use modelrouter::{
    Error, ModelRouter, Route, RoutingRequest, SelectionCriteria, Strategy, TokenCostEstimator,
};

const ALL_CAPS: &[Capability] = &[
    Capability::Chat,
    Capability::FunctionCalling,
    Capability::Streaming,
    Capability::JsonMode,
    Capability::ImageAnalysis,
];

fn chat_request() -> RoutingRequest {
    RoutingRequest::new(vec![Message::user("Summarize the quarterly report")])
}

fn router_over(registry: ProviderRegistry) -> ModelRouter {
    ModelRouter::new(Arc::new(registry), Arc::new(TokenCostEstimator::default()))
}

/// Three providers, three models, all fully capable.
fn three_model_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::empty(4).unwrap();
    for id in ["openai", "anthropic", "google"] {
        registry.register_provider(ProviderConfig::new(id)).unwrap();
    }
    registry.register_model(
        ModelInfo::new("model-a", "openai", ModelTier::Standard, 128_000)
            .with_capabilities(ALL_CAPS)
            .with_pricing(0.001, 0.002),
    );
    registry.register_model(
        ModelInfo::new("model-b", "anthropic", ModelTier::Premium, 200_000)
            .with_capabilities(ALL_CAPS)
            .with_pricing(0.003, 0.015),
    );
    registry.register_model(
        ModelInfo::new("model-c", "google", ModelTier::Economy, 1_000_000)
            .with_capabilities(ALL_CAPS)
            .with_pricing(0.0001, 0.0004),
    );
    registry
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_cost_optimized_single_candidate() {
    let registry = ProviderRegistry::empty(5).unwrap();
    registry
        .register_provider(ProviderConfig::new("openai").with_priority(1.0))
        .unwrap();
    registry.register_model(
        ModelInfo::new("gpt-x", "openai", ModelTier::Standard, 16_000)
            .with_capabilities(&[Capability::Chat, Capability::Streaming])
            .with_pricing(0.001, 0.002),
    );
    let router = router_over(registry);

    let request = chat_request().with_stream(true);
    let decision = router
        .select_model(
            &request,
            None,
            Some(&SelectionCriteria::with_strategy(Strategy::CostOptimized)),
        )
        .unwrap();

    assert_eq!(decision.model_id, "gpt-x");
    assert_eq!(decision.provider_id, "openai");
    assert_eq!(decision.reason, "Lowest cost model");
    assert!(decision.alternatives.is_empty());
    assert!(decision.estimated_cost_cents > 0.0);
}

#[test]
fn test_no_capable_model_is_model_not_found() {
    let registry = ProviderRegistry::empty(5).unwrap();
    registry
        .register_provider(ProviderConfig::new("openai"))
        .unwrap();
    registry.register_model(
        ModelInfo::new("text-only", "openai", ModelTier::Standard, 16_000)
            .with_capabilities(&[Capability::Chat]),
    );
    let router = router_over(registry);

    let request = RoutingRequest::new(vec![Message::parts(
        "user",
        vec![ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "https://example.com/chart.png".to_string(),
                detail: None,
            },
        }],
    )]);
    let err = router.select_model(&request, None, None).unwrap_err();
    assert!(matches!(err, Error::ModelNotFound(_)));
    assert_eq!(err.code(), "MODEL_NOT_FOUND");
}

// ============================================================================
// Explicit model bypass
// ============================================================================

#[test]
fn test_explicit_model_bypasses_strategy() {
    let registry = three_model_registry();
    let router = router_over(registry);
    router.register_route(
        Route::new("cheap-only", Strategy::CostOptimized).with_criteria(SelectionCriteria {
            max_tier: Some(ModelTier::Economy),
            ..Default::default()
        }),
    );

    let decision = router
        .select_model(&chat_request().with_model("model-b"), Some("cheap-only"), None)
        .unwrap();
    assert_eq!(decision.model_id, "model-b");
    assert_eq!(decision.reason, "Explicitly specified");
    assert!(decision.alternatives.is_empty());
}

#[test]
fn test_explicit_model_disabled_or_unavailable() {
    let registry = three_model_registry();
    let router = router_over(registry);
    let request = chat_request().with_model("model-a");

    router.registry().update_provider_status(
        "openai",
        HealthStatus::Unavailable,
        None,
    );
    let err = router.select_model(&request, None, None).unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { .. }));
    assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");

    let disabled = router
        .registry()
        .get_model("model-a")
        .unwrap()
        .disabled();
    router.registry().register_model(disabled);
    let err = router.select_model(&request, None, None).unwrap_err();
    assert!(matches!(err, Error::ModelNotFound(_)));
}

// ============================================================================
// Candidate monotonicity
// ============================================================================

#[test]
fn test_adding_criteria_never_grows_candidates() {
    let router = router_over(three_model_registry());
    let request = chat_request();

    let steps = vec![
        SelectionCriteria::default(),
        SelectionCriteria {
            min_tier: Some(ModelTier::Standard),
            ..Default::default()
        },
        SelectionCriteria {
            min_tier: Some(ModelTier::Standard),
            max_cost_per_1k: Some(0.01),
            ..Default::default()
        },
        SelectionCriteria {
            min_tier: Some(ModelTier::Standard),
            max_cost_per_1k: Some(0.01),
            excluded_providers: vec!["openai".to_string()],
            ..Default::default()
        },
    ];

    let mut previous = usize::MAX;
    for criteria in &steps {
        let count = router.candidate_models(&request, criteria).len();
        assert!(count <= previous, "{:?} grew the candidate set", criteria);
        previous = count;
    }
    assert_eq!(previous, 0);
}

#[test]
fn test_request_shape_only_narrows() {
    let registry = three_model_registry();
    registry.register_model(
        ModelInfo::new("plain", "openai", ModelTier::Economy, 8_000)
            .with_capabilities(&[Capability::Chat])
            .with_pricing(0.00001, 0.00001),
    );
    let router = router_over(registry);
    let criteria = SelectionCriteria::default();

    let plain = router.candidate_models(&chat_request(), &criteria).len();
    let rich = chat_request()
        .with_stream(true)
        .with_tools(vec![ToolDefinition::function(
            "get_weather",
            serde_json::json!({"type": "object"}),
        )])
        .with_response_format(ResponseFormat::JsonObject);
    let narrowed = router.candidate_models(&rich, &criteria);

    assert_eq!(plain, 4);
    assert_eq!(narrowed.len(), 3);
    assert!(narrowed.iter().all(|m| m.id != "plain"));
}

#[test]
fn test_preferred_providers_never_empty_the_set() {
    let router = router_over(three_model_registry());
    let request = chat_request();

    let preferred = SelectionCriteria {
        preferred_providers: vec!["anthropic".to_string()],
        ..Default::default()
    };
    let ids: Vec<String> = router
        .candidate_models(&request, &preferred)
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec!["model-b".to_string()]);

    let unmatched = SelectionCriteria {
        preferred_providers: vec!["mistral".to_string()],
        ..Default::default()
    };
    assert_eq!(router.candidate_models(&request, &unmatched).len(), 3);
}

// ============================================================================
// Round-robin
// ============================================================================

#[test]
fn test_round_robin_cycles_in_order() {
    let router = router_over(three_model_registry());
    router.register_route(Route::new("rr", Strategy::RoundRobin));

    let picks: Vec<String> = (0..4)
        .map(|_| {
            router
                .select_model(&chat_request(), Some("rr"), None)
                .unwrap()
                .model_id
        })
        .collect();

    assert_eq!(picks[0], "model-a");
    assert_eq!(picks[1], "model-b");
    assert_eq!(picks[2], "model-c");
    assert_eq!(picks[3], picks[0]);
}

// ============================================================================
// Weighted
// ============================================================================

#[test]
fn test_weighted_equal_weights_split_evenly() {
    let registry = ProviderRegistry::empty(5).unwrap();
    for id in ["openai", "anthropic"] {
        registry.register_provider(ProviderConfig::new(id)).unwrap();
    }
    for (id, provider) in [("left", "openai"), ("right", "anthropic")] {
        registry.register_model(
            ModelInfo::new(id, provider, ModelTier::Standard, 32_000)
                .with_capabilities(&[Capability::Chat])
                .with_pricing(0.001, 0.002),
        );
    }
    let router = router_over(registry);
    let criteria = SelectionCriteria::with_strategy(Strategy::Weighted);

    const DRAWS: usize = 4000;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..DRAWS {
        let decision = router
            .select_model(&chat_request(), None, Some(&criteria))
            .unwrap();
        assert_eq!(decision.reason, "Weighted random selection");
        *counts.entry(decision.model_id).or_default() += 1;
    }

    let left = counts.get("left").copied().unwrap_or(0) as f64 / DRAWS as f64;
    assert!(
        (0.45..=0.55).contains(&left),
        "left share {} outside tolerance: {:?}",
        left,
        counts
    );
}

#[test]
fn test_weighted_favours_priority() {
    let registry = ProviderRegistry::empty(5).unwrap();
    registry
        .register_provider(ProviderConfig::new("openai").with_priority(9.0))
        .unwrap();
    registry
        .register_provider(ProviderConfig::new("anthropic").with_priority(1.0))
        .unwrap();
    for (id, provider) in [("heavy", "openai"), ("light", "anthropic")] {
        registry.register_model(
            ModelInfo::new(id, provider, ModelTier::Standard, 32_000)
                .with_capabilities(&[Capability::Chat])
                .with_pricing(0.001, 0.002),
        );
    }
    let router = router_over(registry);
    let criteria = SelectionCriteria::with_strategy(Strategy::Weighted);

    let heavy = (0..2000)
        .filter(|_| {
            router
                .select_model(&chat_request(), None, Some(&criteria))
                .unwrap()
                .model_id
                == "heavy"
        })
        .count();
    assert!(heavy > 1600, "heavy picked only {} of 2000", heavy);
}

// ============================================================================
// Fallback
// ============================================================================

fn chain_router() -> ModelRouter {
    let router = router_over(three_model_registry());
    router.register_route(
        Route::new("chain", Strategy::CostOptimized)
            .with_fallback_chain(["model-a", "model-b", "model-c"]),
    );
    router
}

#[test]
fn test_fallback_chain_returns_next_entry() {
    let router = chain_router();

    let decision = router
        .get_fallback("model-a", &chat_request(), Some("chain"))
        .unwrap()
        .unwrap();
    assert_eq!(decision.model_id, "model-b");
    assert_eq!(decision.strategy, None);
    assert_eq!(decision.alternatives, vec!["model-c".to_string()]);

    let decision = router
        .get_fallback("model-b", &chat_request(), Some("chain"))
        .unwrap()
        .unwrap();
    assert_eq!(decision.model_id, "model-c");
}

#[test]
fn test_fallback_chain_end_falls_through_to_failover() {
    let router = chain_router();
    router
        .registry()
        .update_provider_status("anthropic", HealthStatus::Available, Some(100));
    router.registry().record_error("openai", false);

    let decision = router
        .get_fallback("model-c", &chat_request(), Some("chain"))
        .unwrap()
        .unwrap();
    // openai is unknown with one error, anthropic is available.
    assert_eq!(decision.model_id, "model-b");
    assert_eq!(decision.strategy, Some(Strategy::Failover));
    assert_eq!(decision.alternatives, vec!["model-a".to_string()]);
}

#[test]
fn test_fallback_chain_skips_disabled_entry() {
    let router = chain_router();
    let disabled = router
        .registry()
        .get_model("model-b")
        .unwrap()
        .disabled();
    router.registry().register_model(disabled);

    let decision = router
        .get_fallback("model-a", &chat_request(), Some("chain"))
        .unwrap()
        .unwrap();
    assert_eq!(decision.model_id, "model-c");
}

#[test]
fn test_fallback_emits_events() {
    let (sink, mut rx) = ChannelEventSink::new();
    let router = chain_router().with_event_sink(Arc::new(sink));

    router
        .get_fallback("model-a", &chat_request(), Some("chain"))
        .unwrap();
    match rx.try_recv().unwrap() {
        RouterEvent::RouteFallback {
            failed_model,
            model,
            source,
            ..
        } => {
            assert_eq!(failed_model, "model-a");
            assert_eq!(model, "model-b");
            assert_eq!(source, FallbackSource::Chain);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_fallback_exhausted_returns_none() {
    let registry = ProviderRegistry::empty(4).unwrap();
    registry
        .register_provider(ProviderConfig::new("openai"))
        .unwrap();
    registry.register_model(
        ModelInfo::new("only", "openai", ModelTier::Standard, 16_000)
            .with_capabilities(&[Capability::Chat]),
    );
    let (sink, mut rx) = ChannelEventSink::new();
    let router = router_over(registry).with_event_sink(Arc::new(sink));

    let result = router.get_fallback("only", &chat_request(), None).unwrap();
    assert!(result.is_none());

    let event = rx.try_recv().unwrap();
    assert_eq!(event.name(), "route.failed");
}

#[test]
fn test_selection_emits_candidate_list() {
    let (sink, mut rx) = ChannelEventSink::new();
    let router = router_over(three_model_registry()).with_event_sink(Arc::new(sink));

    let decision = router.select_model(&chat_request(), None, None).unwrap();
    assert_eq!(decision.model_id, "model-c");

    match rx.try_recv().unwrap() {
        RouterEvent::RouteSelected {
            strategy,
            candidates,
            model,
            ..
        } => {
            assert_eq!(strategy, Strategy::CostOptimized);
            assert_eq!(model, "model-c");
            assert_eq!(candidates, vec!["model-a", "model-b", "model-c"]);
        }
        other => panic!("unexpected event {:?}", other),
    }
}
