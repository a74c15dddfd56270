/// Trace sinks
///
/// A trace is the only persisted record of a request, so the pipeline awaits
/// `flush` before a response is produced.
use crate::{
    error::{AppError, AppResult},
    models::TraceRecord,
};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

/// Destination for finalized traces
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TraceSink: Send + Sync {
    async fn flush(&self, trace: &TraceRecord) -> AppResult<()>;

    /// Sink name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Emits traces as structured log events. Used when no sink is configured.
#[derive(Clone, Default)]
pub struct LogTraceSink;

#[async_trait::async_trait]
impl TraceSink for LogTraceSink {
    async fn flush(&self, trace: &TraceRecord) -> AppResult<()> {
        for span in &trace.spans {
            tracing::info!(
                trace_id = %trace.trace_id,
                span = %span.name,
                success = span.success,
                input = %span.input,
                output = %span.output,
                "Trace span"
            );
        }

        tracing::info!(
            trace_id = %trace.trace_id,
            request_id = %trace.request_id,
            name = %trace.name,
            tags = ?trace.tags,
            total_cost = trace.total_cost,
            total_tokens = trace.total_tokens,
            success = trace.success,
            error = trace.error_message.as_deref().unwrap_or(""),
            "Trace"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Opik REST ingestion. Opik only accepts UUID v7 trace and span ids.
#[derive(Clone)]
pub struct OpikTraceSink {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    workspace: Option<String>,
    project_name: String,
}

impl OpikTraceSink {
    pub fn new(
        http_client: HttpClient,
        api_key: String,
        api_url: String,
        workspace: Option<String>,
        project_name: String,
    ) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
            workspace,
            project_name,
        }
    }

    async fn post_batch(&self, path: &str, body: &Value) -> AppResult<()> {
        let url = format!("{}/v1/private/{}", self.api_url.trim_end_matches('/'), path);

        let mut request = self
            .http_client
            .post(&url)
            .header("authorization", &self.api_key)
            .json(body);

        if let Some(workspace) = &self.workspace {
            request = request.header("Comet-Workspace", workspace);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Trace sink returned status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl TraceSink for OpikTraceSink {
    async fn flush(&self, trace: &TraceRecord) -> AppResult<()> {
        self.post_batch("traces/batch", &trace_payload(trace, &self.project_name))
            .await?;
        self.post_batch("spans/batch", &spans_payload(trace, &self.project_name))
            .await?;

        tracing::debug!(
            trace_id = %trace.trace_id,
            spans = trace.spans.len(),
            sink = "opik",
            "Trace flushed"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "opik"
    }
}

fn trace_payload(trace: &TraceRecord, project_name: &str) -> Value {
    json!({
        "traces": [{
            "id": trace.trace_id,
            "project_name": project_name,
            "name": trace.name,
            "start_time": trace.start_time,
            "end_time": trace.end_time,
            "input": trace.input,
            "output": {
                "success": trace.success,
                "error": trace.error_message,
            },
            "tags": trace.tags,
            "metadata": {
                "requestId": trace.request_id,
                "totalCost": trace.total_cost,
                "totalTokens": trace.total_tokens,
            },
        }]
    })
}

fn spans_payload(trace: &TraceRecord, project_name: &str) -> Value {
    let spans: Vec<Value> = trace
        .spans
        .iter()
        .map(|span| {
            json!({
                "id": span.id,
                "trace_id": trace.trace_id,
                "project_name": project_name,
                "name": span.name,
                "type": if span.name == "generation" { "llm" } else { "general" },
                "start_time": span.start_time,
                "end_time": span.end_time,
                "input": span.input,
                "output": span.output,
            })
        })
        .collect();

    json!({ "spans": spans })
}
