use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{PreferenceSet, RecommendationResult},
    services::{
        embedding::Embedder,
        generation::{interpret, ChatModel, ExplanationPrompt, GENERATION_MODEL, GENERATION_TEMPERATURE},
        observability::{
            estimate_cost, estimate_embedding_tokens, ScoreStats, TraceRecorder, TraceSink,
        },
        retrieval::Retriever,
    },
};

/// Operational parameters of the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub match_threshold: f32,
    pub match_count: usize,
    /// Deadline for the whole run, shared by all stages
    pub timeout: Duration,
    /// Budget for flushing the trace once the run has finished
    pub flush_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.2,
            match_count: 6,
            timeout: Duration::from_secs(30),
            flush_timeout: Duration::from_secs(5),
        }
    }
}

/// The three remote stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    Retrieval,
    Generation,
}

impl Stage {
    pub fn span_name(self) -> &'static str {
        match self {
            Stage::Embedding => "embedding",
            Stage::Retrieval => "search",
            Stage::Generation => "generation",
        }
    }

    fn fail(self, details: String) -> AppError {
        match self {
            Stage::Embedding => AppError::UpstreamEmbedding(details),
            Stage::Retrieval => AppError::UpstreamRetrieval(details),
            Stage::Generation => AppError::UpstreamGeneration(details),
        }
    }

    /// Runs a stage call against the pipeline deadline. Any failure is
    /// terminal and tagged with this stage; nothing is retried.
    async fn run<T>(self, deadline: Instant, call: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        match tokio::time::timeout_at(deadline, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.fail(e.to_string())),
            Err(_) => Err(self.fail("Pipeline deadline exceeded".to_string())),
        }
    }
}

/// Embed → retrieve → generate, with one trace per run
///
/// Collaborators are injected so each stage can be replaced independently.
pub struct RecommendationPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Arc<dyn Retriever>,
    chat_model: Arc<dyn ChatModel>,
    trace_sink: Arc<dyn TraceSink>,
    settings: PipelineSettings,
}

impl RecommendationPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Arc<dyn Retriever>,
        chat_model: Arc<dyn ChatModel>,
        trace_sink: Arc<dyn TraceSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            retriever,
            chat_model,
            trace_sink,
            settings,
        }
    }

    /// Produces recommendations for one request.
    ///
    /// The trace is finalized and flushed exactly once on every path before
    /// this returns. The flush has its own time budget; a failed or timed out
    /// flush is logged and does not change the outcome.
    pub async fn run(
        &self,
        request_id: &str,
        preferences: &PreferenceSet,
    ) -> AppResult<RecommendationResult> {
        let mut recorder = TraceRecorder::start(request_id, preferences);
        let deadline = Instant::now() + self.settings.timeout;

        let outcome = self.execute(&mut recorder, preferences, deadline).await;

        if let Err(e) = &outcome {
            tracing::error!(request_id = %request_id, error = %e, "Recommendation pipeline failed");
        }

        let trace = recorder.finish(outcome.as_ref().map(|_| ()));
        let flushed = tokio::time::timeout(
            self.settings.flush_timeout,
            self.trace_sink.flush(&trace),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::Internal(format!(
                "Trace flush exceeded {:?}",
                self.settings.flush_timeout
            )))
        });

        if let Err(e) = flushed {
            tracing::warn!(
                request_id = %request_id,
                trace_id = %trace.trace_id,
                sink = self.trace_sink.name(),
                error = %e,
                "Failed to flush trace"
            );
        }

        outcome
    }

    async fn execute(
        &self,
        recorder: &mut TraceRecorder,
        preferences: &PreferenceSet,
        deadline: Instant,
    ) -> AppResult<RecommendationResult> {
        let settings = self.settings;

        // 1. Embed the combined preferences
        let text = preferences.embedding_text();
        let embedding_model = self.embedder.model();
        let embedding_tokens = estimate_embedding_tokens(&text);
        let embedding_cost = estimate_cost(embedding_model, embedding_tokens, 0);

        let vector = recorder
            .observe(
                Stage::Embedding.span_name(),
                json!({ "model": embedding_model, "inputLength": text.len() }),
                Stage::Embedding.run(deadline, self.embedder.embed(&text)),
                |vector| {
                    json!({
                        "dimensions": vector.len(),
                        "estimatedTokens": embedding_tokens,
                        "cost": embedding_cost,
                    })
                },
            )
            .await?;
        recorder.add_usage(embedding_model, embedding_tokens, 0);

        // 2. Find the nearest movies
        let candidates = recorder
            .observe(
                Stage::Retrieval.span_name(),
                json!({
                    "matchThreshold": settings.match_threshold,
                    "matchCount": settings.match_count,
                }),
                Stage::Retrieval.run(
                    deadline,
                    self.retriever
                        .search(&vector, settings.match_threshold, settings.match_count),
                ),
                |candidates| {
                    let stats = ScoreStats::from_candidates(candidates);
                    json!({
                        "returned": candidates.len(),
                        "topScore": stats.top,
                        "avgScore": stats.avg,
                        "minScore": stats.min,
                    })
                },
            )
            .await?;

        tracing::info!(
            trace_id = %recorder.trace_id(),
            candidates = candidates.len(),
            "Candidates retrieved"
        );

        // 3. Explain the candidates to the group
        let prompt = ExplanationPrompt::build(preferences, &candidates, settings.match_count);
        let generation_input = json!({
            "model": GENERATION_MODEL,
            "temperature": GENERATION_TEMPERATURE,
            "systemPromptLength": prompt.system.len(),
            "userPromptLength": prompt.user.len(),
        });

        let completion = recorder
            .observe(
                Stage::Generation.span_name(),
                generation_input,
                Stage::Generation.run(deadline, self.chat_model.complete(prompt.into_request())),
                |completion| {
                    let usage = completion.usage;
                    json!({
                        "responseLength": completion.text.len(),
                        "promptTokens": usage.prompt_tokens,
                        "completionTokens": usage.completion_tokens,
                        "totalTokens": usage.total_tokens,
                        "cost": estimate_cost(
                            GENERATION_MODEL,
                            usage.prompt_tokens,
                            usage.completion_tokens,
                        ),
                    })
                },
            )
            .await?;
        recorder.add_usage(
            GENERATION_MODEL,
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens,
        );

        let result = interpret(completion.text, candidates);

        tracing::info!(
            trace_id = %recorder.trace_id(),
            no_match = result.no_match,
            total_cost = recorder.total_cost(),
            total_tokens = recorder.total_tokens(),
            "Recommendation generated"
        );

        Ok(result)
    }
}
