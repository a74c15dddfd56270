mod movie;
mod preferences;
mod trace;

pub use movie::{CandidateMovie, EmbeddingVector, RecommendationResult, EMBEDDING_DIMENSIONS};
pub use preferences::{
    MovieSetUpPreferences, ParticipantResponse, PersonResponse, PreferenceSet,
    RecommendationRequest,
};
pub use trace::{SpanRecord, TraceRecord};
