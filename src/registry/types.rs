//! Model catalog types shared by the registry and the router.

use serde::{Deserialize, Serialize};

/// Something a model (or a provider) can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Completion,
    FunctionCalling,
    Streaming,
    JsonMode,
    ImageAnalysis,
    Embeddings,
    Code,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::Completion => "completion",
            Capability::FunctionCalling => "function_calling",
            Capability::Streaming => "streaming",
            Capability::JsonMode => "json_mode",
            Capability::ImageAnalysis => "image_analysis",
            Capability::Embeddings => "embeddings",
            Capability::Code => "code",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality tier. Declaration order is the ordering: economy is lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Economy,
    Standard,
    Premium,
    Flagship,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Economy => "economy",
            ModelTier::Standard => "standard",
            ModelTier::Premium => "premium",
            ModelTier::Flagship => "flagship",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// A single callable model, bound to exactly one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Unique model identifier (e.g., "gpt-4o")
    pub id: String,
    /// Identifier of the provider hosting this model
    pub provider: String,
    /// Human-readable name, defaults to the id when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    pub tier: ModelTier,
    /// Context window in tokens
    pub context_window: u32,
    /// Input price in USD per 1000 tokens
    pub input_price_per_1k: f64,
    /// Output price in USD per 1000 tokens
    pub output_price_per_1k: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl ModelInfo {
    /// Create an enabled model with no capabilities and zero pricing.
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        tier: ModelTier,
        context_window: u32,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            name: None,
            enabled: true,
            capabilities: Vec::new(),
            tier,
            context_window,
            input_price_per_1k: 0.0,
            output_price_per_1k: 0.0,
            max_output_tokens: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    pub fn with_pricing(mut self, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.input_price_per_1k = input_per_1k;
        self.output_price_per_1k = output_per_1k;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn has_all(&self, required: &[Capability]) -> bool {
        required.iter().all(|c| self.has_capability(*c))
    }

    /// Input plus output price per 1000 tokens, the figure cost filters compare against.
    pub fn combined_price_per_1k(&self) -> f64 {
        self.input_price_per_1k + self.output_price_per_1k
    }
}
