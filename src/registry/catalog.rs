//! Static provider capability table and the default model catalog.

use super::types::{Capability, ModelInfo, ModelTier};

use Capability::*;

const OPENAI: &[Capability] = &[
    Chat,
    Completion,
    FunctionCalling,
    Streaming,
    JsonMode,
    ImageAnalysis,
    Embeddings,
    Code,
];
const ANTHROPIC: &[Capability] = &[Chat, FunctionCalling, Streaming, ImageAnalysis, Code];
const GOOGLE: &[Capability] = &[
    Chat,
    Completion,
    FunctionCalling,
    Streaming,
    JsonMode,
    ImageAnalysis,
    Embeddings,
    Code,
];
const MISTRAL: &[Capability] = &[Chat, FunctionCalling, Streaming, JsonMode, Embeddings, Code];
const COHERE: &[Capability] = &[Chat, FunctionCalling, Streaming, Embeddings];
const GROQ: &[Capability] = &[Chat, FunctionCalling, Streaming, JsonMode];
const DEEPSEEK: &[Capability] = &[Chat, FunctionCalling, Streaming, JsonMode, Code];
const TOGETHER: &[Capability] = &[Chat, Completion, Streaming, JsonMode, Embeddings, Code];
const OLLAMA: &[Capability] = &[Chat, Completion, Streaming, JsonMode, Embeddings];

/// Capabilities a known provider offers, or `None` for an unknown identifier.
///
/// Registration is only allowed for providers listed here.
pub fn known_provider_capabilities(provider_id: &str) -> Option<&'static [Capability]> {
    match provider_id {
        "openai" => Some(OPENAI),
        "anthropic" => Some(ANTHROPIC),
        "google" => Some(GOOGLE),
        "mistral" => Some(MISTRAL),
        "cohere" => Some(COHERE),
        "groq" => Some(GROQ),
        "deepseek" => Some(DEEPSEEK),
        "together" => Some(TOGETHER),
        "ollama" => Some(OLLAMA),
        _ => None,
    }
}

pub fn known_provider_ids() -> &'static [&'static str] {
    &[
        "openai",
        "anthropic",
        "google",
        "mistral",
        "cohere",
        "groq",
        "deepseek",
        "together",
        "ollama",
    ]
}

/// Models seeded into a registry at construction.
pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new("gpt-4o", "openai", ModelTier::Premium, 128_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode, ImageAnalysis, Code])
            .with_pricing(0.0025, 0.01)
            .with_max_output_tokens(16_384),
        ModelInfo::new("gpt-4o-mini", "openai", ModelTier::Economy, 128_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode, ImageAnalysis])
            .with_pricing(0.00015, 0.0006)
            .with_max_output_tokens(16_384),
        ModelInfo::new("o1", "openai", ModelTier::Flagship, 200_000)
            .with_capabilities(&[Chat, FunctionCalling, JsonMode, ImageAnalysis, Code])
            .with_pricing(0.015, 0.06)
            .with_max_output_tokens(100_000),
        ModelInfo::new("claude-3-5-sonnet", "anthropic", ModelTier::Premium, 200_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, ImageAnalysis, Code])
            .with_pricing(0.003, 0.015)
            .with_max_output_tokens(8_192),
        ModelInfo::new("claude-3-opus", "anthropic", ModelTier::Flagship, 200_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, ImageAnalysis, Code])
            .with_pricing(0.015, 0.075)
            .with_max_output_tokens(4_096),
        ModelInfo::new("claude-3-haiku", "anthropic", ModelTier::Economy, 200_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, ImageAnalysis])
            .with_pricing(0.00025, 0.00125)
            .with_max_output_tokens(4_096),
        ModelInfo::new("gemini-1.5-pro", "google", ModelTier::Premium, 2_000_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode, ImageAnalysis, Code])
            .with_pricing(0.00125, 0.005)
            .with_max_output_tokens(8_192),
        ModelInfo::new("gemini-1.5-flash", "google", ModelTier::Economy, 1_000_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode, ImageAnalysis])
            .with_pricing(0.000075, 0.0003)
            .with_max_output_tokens(8_192),
        ModelInfo::new("mistral-large", "mistral", ModelTier::Premium, 128_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode, Code])
            .with_pricing(0.002, 0.006),
        ModelInfo::new("mistral-small", "mistral", ModelTier::Standard, 32_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode])
            .with_pricing(0.0002, 0.0006),
        ModelInfo::new("llama-3.1-70b", "groq", ModelTier::Standard, 128_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode])
            .with_pricing(0.00059, 0.00079),
        ModelInfo::new("deepseek-chat", "deepseek", ModelTier::Standard, 64_000)
            .with_capabilities(&[Chat, FunctionCalling, Streaming, JsonMode, Code])
            .with_pricing(0.00014, 0.00028),
    ]
}
