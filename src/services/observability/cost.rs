use crate::models::CandidateMovie;

const PER_MILLION: f64 = 1_000_000.0;

/// Fallback pricing for models missing from the table
pub const FALLBACK_PRICING_MODEL: &str = "gpt-4o-mini";

/// USD per one million tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

const PRICING: &[(&str, ModelPricing)] = &[
    (
        "gpt-4o-mini",
        ModelPricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
        },
    ),
    (
        "gpt-4o",
        ModelPricing {
            input_per_million: 2.50,
            output_per_million: 10.00,
        },
    ),
    (
        "text-embedding-3-small",
        ModelPricing {
            input_per_million: 0.02,
            output_per_million: 0.0,
        },
    ),
    (
        "text-embedding-3-large",
        ModelPricing {
            input_per_million: 0.13,
            output_per_million: 0.0,
        },
    ),
];

impl ModelPricing {
    /// Pricing for a model, or `None` when the model is not in the table
    pub fn lookup(model: &str) -> Option<Self> {
        PRICING
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, pricing)| *pricing)
    }

    /// Pricing for a model, falling back to `gpt-4o-mini` rates
    pub fn for_model(model: &str) -> Self {
        Self::lookup(model).unwrap_or_else(|| {
            tracing::warn!(
                model = %model,
                fallback = FALLBACK_PRICING_MODEL,
                "No pricing for model, using fallback rates"
            );
            Self {
                input_per_million: 0.15,
                output_per_million: 0.60,
            }
        })
    }
}

/// Estimated USD cost of one call
pub fn estimate_cost(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let pricing = ModelPricing::for_model(model);
    prompt_tokens as f64 * pricing.input_per_million / PER_MILLION
        + completion_tokens as f64 * pricing.output_per_million / PER_MILLION
}

/// The embedding endpoint reports no usage; roughly four characters per token.
pub fn estimate_embedding_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Score summary over retrieved candidates, all zero when there are none
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreStats {
    pub top: f32,
    pub avg: f32,
    pub min: f32,
}

impl ScoreStats {
    pub fn from_candidates(candidates: &[CandidateMovie]) -> Self {
        if candidates.is_empty() {
            return Self::default();
        }

        let scores = candidates.iter().map(|c| c.score);
        let top = scores.clone().fold(f32::MIN, f32::max);
        let min = scores.clone().fold(f32::MAX, f32::min);
        let avg = scores.sum::<f32>() / candidates.len() as f32;

        Self { top, avg, min }
    }
}
