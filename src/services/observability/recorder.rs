use std::collections::BTreeSet;
use std::future::Future;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{PreferenceSet, SpanRecord, TraceRecord},
};

use super::cost::estimate_cost;

pub const TRACE_NAME: &str = "movie-recommendation";

/// Request-scoped trace builder
///
/// Spans are appended in call order and each one is closed by `observe`
/// whichever way its call ends. `finish` consumes the recorder, so a trace
/// can only be finalized once.
pub struct TraceRecorder {
    trace_id: String,
    request_id: String,
    input: Value,
    tags: BTreeSet<String>,
    spans: Vec<SpanRecord>,
    total_cost: f64,
    total_tokens: u64,
    start_time: chrono::DateTime<Utc>,
}

impl TraceRecorder {
    /// Opens a trace with a fresh time-ordered id; the request id is kept
    /// alongside it for correlation with HTTP logs.
    pub fn start(request_id: impl Into<String>, preferences: &PreferenceSet) -> Self {
        let tags = BTreeSet::from([
            format!("participants:{}", preferences.participants.len()),
            format!("time:{}", preferences.available_time),
        ]);

        Self {
            trace_id: Uuid::now_v7().to_string(),
            request_id: request_id.into(),
            input: json!({
                "numberOfPeople": preferences.number_of_people,
                "availableTime": preferences.available_time,
                "participantCount": preferences.participants.len(),
            }),
            tags,
            spans: Vec::new(),
            total_cost: 0.0,
            total_tokens: 0,
            start_time: Utc::now(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Runs one remote call inside a named span.
    ///
    /// `describe` builds the span output from a successful result; failures
    /// record the error message instead.
    pub async fn observe<T, F, D>(
        &mut self,
        name: &str,
        input: Value,
        call: F,
        describe: D,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
        D: FnOnce(&T) -> Value,
    {
        let start_time = Utc::now();
        let result = call.await;
        let end_time = Utc::now();

        let (output, success) = match &result {
            Ok(value) => (describe(value), true),
            Err(e) => (json!({ "error": e.to_string() }), false),
        };

        tracing::debug!(
            trace_id = %self.trace_id,
            span = %name,
            success,
            duration_ms = (end_time - start_time).num_milliseconds(),
            "Span closed"
        );

        self.spans.push(SpanRecord {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            input,
            output,
            start_time,
            end_time,
            success,
        });

        result
    }

    /// Adds one call's tokens and estimated cost to the running totals
    pub fn add_usage(&mut self, model: &str, prompt_tokens: u64, completion_tokens: u64) {
        self.total_cost += estimate_cost(model, prompt_tokens, completion_tokens);
        self.total_tokens += prompt_tokens + completion_tokens;
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn spans(&self) -> &[SpanRecord] {
        &self.spans
    }

    /// Finalizes the trace with the request outcome
    pub fn finish(self, outcome: Result<(), &AppError>) -> TraceRecord {
        let error_message = outcome.err().map(|e| e.to_string());
        let success = error_message.is_none();

        tracing::info!(
            trace_id = %self.trace_id,
            request_id = %self.request_id,
            spans = self.spans.len(),
            total_cost = self.total_cost,
            total_tokens = self.total_tokens,
            success,
            "Trace finalized"
        );

        TraceRecord {
            trace_id: self.trace_id,
            request_id: self.request_id,
            name: TRACE_NAME.to_string(),
            input: self.input,
            spans: self.spans,
            tags: self.tags,
            total_cost: self.total_cost,
            total_tokens: self.total_tokens,
            success,
            error_message,
            start_time: self.start_time,
            end_time: Utc::now(),
        }
    }
}
