pub mod cost;
pub mod recorder;
pub mod sink;

pub use cost::{estimate_cost, estimate_embedding_tokens, ModelPricing, ScoreStats};
pub use recorder::TraceRecorder;
pub use sink::{LogTraceSink, OpikTraceSink, TraceSink};
