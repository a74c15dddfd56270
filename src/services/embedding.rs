/// Embedding client
///
/// Turns the group's combined preferences into a single vector through an
/// OpenAI-compatible `/embeddings` endpoint.
use crate::{
    error::{AppError, AppResult},
    models::{EmbeddingVector, EMBEDDING_DIMENSIONS},
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Converts text into an embedding vector
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<EmbeddingVector>;

    /// Model name used for tracing and cost estimation
    fn model(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl OpenAiEmbedder {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> AppResult<EmbeddingVector> {
        let url = format!("{}/embeddings", self.api_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: EMBEDDING_MODEL,
                input: text,
                encoding_format: "float",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Embedding API returned status {}: {}",
                status, body
            )));
        }

        let body: EmbeddingResponse = response.json().await?;
        let embedding = extract_embedding(body)?;

        tracing::debug!(
            model = EMBEDDING_MODEL,
            input_length = text.len(),
            dimensions = embedding.len(),
            "Embedding generated"
        );

        Ok(embedding)
    }

    fn model(&self) -> &'static str {
        EMBEDDING_MODEL
    }
}

fn extract_embedding(response: EmbeddingResponse) -> AppResult<EmbeddingVector> {
    let embedding = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| AppError::ExternalApi("Embedding response contained no data".to_string()))?;

    if embedding.len() != EMBEDDING_DIMENSIONS {
        return Err(AppError::ExternalApi(format!(
            "Expected {} embedding dimensions, got {}",
            EMBEDDING_DIMENSIONS,
            embedding.len()
        )));
    }

    Ok(embedding)
}
