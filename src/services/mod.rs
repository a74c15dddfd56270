pub mod embedding;
pub mod generation;
pub mod observability;
pub mod pipeline;
pub mod retrieval;

pub use pipeline::{PipelineSettings, RecommendationPipeline, Stage};
