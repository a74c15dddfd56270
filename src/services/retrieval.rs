/// Similarity retrieval against an external vector store
///
/// API Flow:
/// 1. Query: /query → nearest `{id, score}` matches, best first
/// 2. Fetch: /fetch → stored movie text for the retained ids
///
/// Matches below the threshold are dropped between the two calls so content
/// is only fetched for movies that will be used.
use crate::{
    error::{AppError, AppResult},
    models::CandidateMovie,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Finds the stored movies closest to a preference vector
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most `match_count` candidates, each with
    /// `score >= match_threshold`, in store order.
    async fn search(
        &self,
        vector: &[f32],
        match_threshold: f32,
        match_count: usize,
    ) -> AppResult<Vec<CandidateMovie>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest<'a> {
    ids: &'a [String],
    include_data: bool,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct StoreResponse<T> {
    result: Vec<T>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
struct StoredMovie {
    id: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

impl StoredMovie {
    fn content(self) -> Option<(String, String)> {
        let content = self.data.or_else(|| {
            self.metadata
                .as_ref()
                .and_then(|m| m["content"].as_str())
                .map(str::to_string)
        })?;
        Some((self.id, content))
    }
}

#[derive(Clone)]
pub struct VectorStoreRetriever {
    http_client: HttpClient,
    token: String,
    api_url: String,
}

impl VectorStoreRetriever {
    pub fn new(http_client: HttpClient, token: String, api_url: String) -> Self {
        Self {
            http_client,
            token,
            api_url,
        }
    }

    async fn post<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<Vec<T>> {
        let url = format!("{}/{}", self.api_url.trim_end_matches('/'), path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Vector store returned status {}: {}",
                status, body
            )));
        }

        let parsed: StoreResponse<T> = response.json().await?;
        Ok(parsed.result)
    }
}

#[async_trait::async_trait]
impl Retriever for VectorStoreRetriever {
    async fn search(
        &self,
        vector: &[f32],
        match_threshold: f32,
        match_count: usize,
    ) -> AppResult<Vec<CandidateMovie>> {
        let matches: Vec<VectorMatch> = self
            .post(
                "query",
                &QueryRequest {
                    vector,
                    top_k: match_count,
                },
            )
            .await?;

        let retained = retain_above_threshold(matches, match_threshold, match_count);
        if retained.is_empty() {
            tracing::info!(threshold = match_threshold, "No matches above threshold");
            return Ok(vec![]);
        }

        let ids: Vec<String> = retained.iter().map(|m| m.id.clone()).collect();
        let stored: Vec<StoredMovie> = self
            .post(
                "fetch",
                &FetchRequest {
                    ids: &ids,
                    include_data: true,
                    include_metadata: true,
                },
            )
            .await?;

        let contents: HashMap<String, String> =
            stored.into_iter().filter_map(StoredMovie::content).collect();

        let candidates = attach_content(retained, contents);

        tracing::info!(
            requested = match_count,
            returned = candidates.len(),
            "Similarity search completed"
        );

        Ok(candidates)
    }
}

/// Drops matches under the threshold and caps the count, preserving order
pub fn retain_above_threshold(
    matches: Vec<VectorMatch>,
    match_threshold: f32,
    match_count: usize,
) -> Vec<VectorMatch> {
    matches
        .into_iter()
        .filter(|m| m.score >= match_threshold)
        .take(match_count)
        .collect()
}

fn attach_content(
    matches: Vec<VectorMatch>,
    mut contents: HashMap<String, String>,
) -> Vec<CandidateMovie> {
    matches
        .into_iter()
        .filter_map(|m| match contents.remove(&m.id) {
            Some(content) => Some(CandidateMovie {
                id: m.id,
                content,
                score: m.score,
            }),
            None => {
                tracing::warn!(movie_id = %m.id, "Vector store returned no content for match");
                None
            }
        })
        .collect()
}
