//! Cost estimation seam.
//!
//! The router treats the estimator as a hard per-call dependency: an
//! estimation error aborts the routing call that needed it.

use serde::Serialize;

use crate::error::Result;
use crate::registry::ModelInfo;
use crate::request::RoutingRequest;

/// Estimated price of serving one request on one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub estimated_cost_cents: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Prices a request against a candidate model.
pub trait CostEstimator: Send + Sync {
    fn estimate(&self, request: &RoutingRequest, model: &ModelInfo) -> Result<CostEstimate>;
}

/// Output tokens assumed when the request sets no `max_tokens`.
const DEFAULT_OUTPUT_TOKENS: u32 = 500;

/// Flat token allowance charged per image part.
const IMAGE_TOKENS: u32 = 765;

/// Per-message framing overhead (role markers, separators).
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Heuristic estimator working from model list prices.
///
/// Input tokens are approximated as one token per four characters, plus a
/// flat allowance per image. Output tokens are the request's `max_tokens`,
/// or a default, capped by the model's output limit.
#[derive(Debug, Clone)]
pub struct TokenCostEstimator {
    default_output_tokens: u32,
    image_tokens: u32,
}

impl Default for TokenCostEstimator {
    fn default() -> Self {
        Self {
            default_output_tokens: DEFAULT_OUTPUT_TOKENS,
            image_tokens: IMAGE_TOKENS,
        }
    }
}

impl TokenCostEstimator {
    pub fn new(default_output_tokens: u32, image_tokens: u32) -> Self {
        Self {
            default_output_tokens,
            image_tokens,
        }
    }

    fn input_tokens(&self, request: &RoutingRequest) -> u32 {
        request
            .messages
            .iter()
            .map(|m| {
                let text = m.text_len().div_ceil(4) as u32;
                let images = m.image_count() as u32 * self.image_tokens;
                text + images + MESSAGE_OVERHEAD_TOKENS
            })
            .sum()
    }

    fn output_tokens(&self, request: &RoutingRequest, model: &ModelInfo) -> u32 {
        let wanted = request.max_tokens.unwrap_or(self.default_output_tokens);
        match model.max_output_tokens {
            Some(limit) => wanted.min(limit),
            None => wanted,
        }
    }
}

impl CostEstimator for TokenCostEstimator {
    fn estimate(&self, request: &RoutingRequest, model: &ModelInfo) -> Result<CostEstimate> {
        let input_tokens = self.input_tokens(request);
        let output_tokens = self.output_tokens(request, model);

        let dollars = f64::from(input_tokens) / 1000.0 * model.input_price_per_1k
            + f64::from(output_tokens) / 1000.0 * model.output_price_per_1k;

        Ok(CostEstimate {
            estimated_cost_cents: dollars * 100.0,
            input_tokens,
            output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelTier;
    use crate::request::{ContentPart, ImageUrl, Message};

    fn model() -> ModelInfo {
        ModelInfo::new("gpt-x", "openai", ModelTier::Standard, 16_000).with_pricing(0.001, 0.002)
    }

    #[test]
    fn test_estimate_text_request() {
        let mut request = RoutingRequest::new(vec![Message::user("x".repeat(400))]);
        request.max_tokens = Some(1000);

        let estimate = TokenCostEstimator::default()
            .estimate(&request, &model())
            .unwrap();

        assert_eq!(estimate.input_tokens, 100 + MESSAGE_OVERHEAD_TOKENS);
        assert_eq!(estimate.output_tokens, 1000);
        // 104 * 0.001/1000 + 1000 * 0.002/1000 dollars
        let expected = (0.104 * 0.001 + 0.002) * 100.0;
        assert!((estimate.estimated_cost_cents - expected).abs() < 1e-9);
    }

    #[test]
    fn test_output_capped_by_model_limit() {
        let mut request = RoutingRequest::new(vec![Message::user("hi")]);
        request.max_tokens = Some(50_000);
        let capped = model().with_max_output_tokens(4096);

        let estimate = TokenCostEstimator::default()
            .estimate(&request, &capped)
            .unwrap();
        assert_eq!(estimate.output_tokens, 4096);
    }

    #[test]
    fn test_images_add_tokens() {
        let request = RoutingRequest::new(vec![Message::parts(
            "user",
            vec![ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://example.com/a.png".to_string(),
                    detail: None,
                },
            }],
        )]);

        let estimator = TokenCostEstimator::new(10, 1000);
        let estimate = estimator.estimate(&request, &model()).unwrap();
        assert_eq!(estimate.input_tokens, 1000 + MESSAGE_OVERHEAD_TOKENS);
        assert_eq!(estimate.output_tokens, 10);
    }

    #[test]
    fn test_cheaper_model_costs_less() {
        let request = RoutingRequest::new(vec![Message::user("summarize this")]);
        let cheap = model().with_pricing(0.0001, 0.0002);
        let estimator = TokenCostEstimator::default();

        let a = estimator.estimate(&request, &cheap).unwrap();
        let b = estimator.estimate(&request, &model()).unwrap();
        assert!(a.estimated_cost_cents < b.estimated_cost_cents);
    }
}
