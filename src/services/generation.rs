/// Explanation generation
///
/// Builds the two-message prompt from the group's preferences and the
/// retrieved candidates, sends it to a chat completion endpoint and turns
/// the free-text answer into a `RecommendationResult`.
use crate::{
    error::{AppError, AppResult},
    models::{CandidateMovie, PreferenceSet, RecommendationResult},
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

pub const GENERATION_MODEL: &str = "gpt-4o-mini";
pub const GENERATION_TEMPERATURE: f32 = 1.1;

/// Sentence the model is told to answer with when nothing fits
pub const NO_MATCH_SENTINEL: &str =
    "Sorry, I don't know a movie at the moment. Lets have another go with the questions from the previous section.";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Token usage reported by the completion endpoint, zero when omitted
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Chat completion backend
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> AppResult<ChatCompletion>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiChatModel {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl OpenAiChatModel {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
        }
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: ChatRequest) -> AppResult<ChatCompletion> {
        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Chat completion API returned status {}: {}",
                status, body
            )));
        }

        let body: CompletionResponse = response.json().await?;
        into_completion(body)
    }
}

fn into_completion(response: CompletionResponse) -> AppResult<ChatCompletion> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::ExternalApi("Chat completion returned no content".to_string()))?;

    Ok(ChatCompletion {
        text,
        usage: response.usage.unwrap_or_default(),
    })
}

/// The system and user messages sent for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationPrompt {
    pub system: String,
    pub user: String,
}

impl ExplanationPrompt {
    /// `match_count` is the number of recommendation paragraphs the model
    /// is asked for.
    pub fn build(
        preferences: &PreferenceSet,
        candidates: &[CandidateMovie],
        match_count: usize,
    ) -> Self {
        let system = format!(
            "You are an enthusiastic movie expert helping a group of {people} people pick a \
             movie they have {time} to watch. You will receive every participant's answers \
             followed by a list of candidate movies. Write exactly {count} short paragraphs, \
             one per candidate movie, each naming the movie and explaining why it suits the \
             group. Only recommend movies from the supplied candidate list. Never recommend \
             a movie just because a participant mentioned it in their own answers. Never \
             make up details that are not in the candidate descriptions. If you are unsure \
             or no candidate fits, answer with exactly: \"{sentinel}\"",
            people = preferences.number_of_people,
            time = preferences.available_time,
            count = match_count,
            sentinel = NO_MATCH_SENTINEL,
        );

        let movies = candidates
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!(
            "Participant answers:\n{}\n\nCandidate movies:\n{}",
            preferences.transcripts(),
            movies
        );

        Self { system, user }
    }

    pub fn into_request(self) -> ChatRequest {
        ChatRequest {
            model: GENERATION_MODEL.to_string(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: self.system,
                },
                ChatMessage {
                    role: Role::User,
                    content: self.user,
                },
            ],
            temperature: GENERATION_TEMPERATURE,
        }
    }
}

/// Classifies the generated text. The sentinel anywhere in the text means
/// no match, regardless of how many candidates were retrieved.
pub fn interpret(text: String, candidates: Vec<CandidateMovie>) -> RecommendationResult {
    if text.contains(NO_MATCH_SENTINEL) {
        RecommendationResult::no_match(text)
    } else {
        RecommendationResult::matched(text, candidates)
    }
}
