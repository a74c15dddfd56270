use serde::{Deserialize, Serialize};

/// Dimensionality of `text-embedding-3-small` vectors
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Embedding of the group's combined preferences
pub type EmbeddingVector = Vec<f32>;

/// A movie returned by the vector store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateMovie {
    pub id: String,
    pub content: String,
    /// Similarity in [0, 1]
    pub score: f32,
}

/// Outcome of one recommendation request, as returned to the client
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationResult {
    #[serde(rename = "content")]
    pub explanation: String,
    /// `None` exactly when `no_match` is set
    #[serde(rename = "movieRecommendations")]
    pub candidates: Option<Vec<CandidateMovie>>,
    #[serde(rename = "noMatchFromLLM")]
    pub no_match: bool,
}

impl RecommendationResult {
    pub fn matched(explanation: String, candidates: Vec<CandidateMovie>) -> Self {
        Self {
            explanation,
            candidates: Some(candidates),
            no_match: false,
        }
    }

    pub fn no_match(explanation: String) -> Self {
        Self {
            explanation,
            candidates: None,
            no_match: true,
        }
    }
}
