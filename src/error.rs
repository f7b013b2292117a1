//! Error types for modelrouter.

/// Result type alias for modelrouter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modelrouter.
///
/// None of these are retried by the router itself; retry policy belongs to
/// the gateway calling into it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider '{provider}' is unavailable for model '{model}'")]
    ProviderUnavailable { provider: String, model: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cost estimation failed for model '{model}': {message}")]
    CostEstimation { model: String, message: String },
}

impl Error {
    /// Stable machine-readable code, suitable for gateway error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::ModelNotFound(_) => "MODEL_NOT_FOUND",
            Error::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::CostEstimation { .. } => "COST_ESTIMATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::ModelNotFound("gpt-x".to_string()).code(),
            "MODEL_NOT_FOUND"
        );
        assert_eq!(
            Error::ProviderUnavailable {
                provider: "openai".to_string(),
                model: "gpt-x".to_string(),
            }
            .code(),
            "PROVIDER_UNAVAILABLE"
        );
        assert_eq!(
            Error::Validation("bad".to_string()).code(),
            "VALIDATION_ERROR"
        );
    }

    #[test]
    fn test_provider_unavailable_message_names_both() {
        let err = Error::ProviderUnavailable {
            provider: "anthropic".to_string(),
            model: "claude-3-haiku".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("anthropic"));
        assert!(msg.contains("claude-3-haiku"));
    }
}
