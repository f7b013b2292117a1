//! modelrouter - model routing and provider health for LLM gateways
//!
//! Command-line front end for inspecting a routing configuration and
//! dry-running routing decisions against it.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelrouter::events::TracingEventSink;
use modelrouter::{Config, ModelRouter, ProviderRegistry, RoutingRequest, TokenCostEstimator};

#[derive(Parser)]
#[command(name = "modelrouter")]
#[command(about = "Model routing and provider health for LLM gateways")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show configured providers and their models
    Providers {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Route a request read from a JSON file and print the decision
    Route {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Path to a JSON chat completion request
        #[arg(short, long)]
        request: String,

        /// Route id to apply
        #[arg(long)]
        route: Option<String>,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("modelrouter={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &str) -> anyhow::Result<Config> {
    let (config, key_sources) = Config::from_file_with_env(path)
        .with_context(|| format!("loading configuration from {}", path))?;
    init_tracing(&config.logging.level);
    for (provider, source) in &key_sources {
        tracing::debug!(provider = %provider, key_source = %source, "Resolved API key");
    }
    Ok(config)
}

fn build_router(config: &Config) -> anyhow::Result<ModelRouter> {
    let sink = Arc::new(TracingEventSink);
    let registry = ProviderRegistry::from_config(config, Some(sink.clone()))?;
    let router = ModelRouter::new(Arc::new(registry), Arc::new(TokenCostEstimator::default()))
        .with_default_strategy(config.router.default_strategy)
        .with_event_sink(sink);
    for route in &config.routes {
        router.register_route(route.clone());
    }
    Ok(router)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load(&config)?;
            println!(
                "Configuration OK: {} providers, {} models, {} routes (default strategy {})",
                config.providers.len(),
                config.models.len(),
                config.routes.len(),
                config.router.default_strategy
            );
            Ok(())
        }

        Commands::Providers { config } => {
            let config = load(&config)?;
            let router = build_router(&config)?;
            let registry = router.registry();
            for provider in registry.get_all_providers() {
                let health = registry.provider_health(&provider.id);
                println!(
                    "{} (enabled: {}, priority: {}, status: {})",
                    provider.id,
                    provider.enabled,
                    provider.priority,
                    health.map(|h| h.status.as_str()).unwrap_or("unknown")
                );
                for model in registry.get_models_for_provider(&provider.id) {
                    println!(
                        "  {:<24} {:<9} ctx {:>9}  ${:.5}/${:.5} per 1K{}",
                        model.id,
                        model.tier.as_str(),
                        model.context_window,
                        model.input_price_per_1k,
                        model.output_price_per_1k,
                        if model.enabled { "" } else { "  (disabled)" }
                    );
                }
            }
            Ok(())
        }

        Commands::Route {
            config,
            request,
            route,
        } => {
            let config = load(&config)?;
            let router = build_router(&config)?;
            let body = std::fs::read_to_string(&request)
                .with_context(|| format!("reading request from {}", request))?;
            let request: RoutingRequest =
                serde_json::from_str(&body).context("parsing request JSON")?;

            let decision = router.select_model(&request, route.as_deref(), None)?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(())
        }
    }
}
