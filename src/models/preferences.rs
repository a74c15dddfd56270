use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Inbound payload for the recommendation endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub movie_set_up_preferences: MovieSetUpPreferences,
    pub people_responses: Vec<PersonResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSetUpPreferences {
    pub number_of_people: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonResponse {
    pub user_responses: String,
    pub stringified_query_and_responses: String,
}

/// One participant's answers. Position in the group is its only identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantResponse {
    /// Short answer text, fed into the embedding
    pub raw_answer: String,
    /// Full question/answer transcript, fed into the generation prompt
    pub transcript: String,
}

/// Validated preferences of a group for a single request
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceSet {
    pub number_of_people: String,
    pub available_time: String,
    pub participants: Vec<ParticipantResponse>,
}

impl PreferenceSet {
    /// Parses and validates a raw request body.
    ///
    /// Everything that would otherwise fail later during the pipeline
    /// (missing fields, wrong types, no participants) is rejected here.
    pub fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::MalformedRequest(
                "Request body is empty".to_string(),
            ));
        }

        let request: RecommendationRequest = serde_json::from_slice(body)
            .map_err(|e| AppError::MalformedRequest(e.to_string()))?;

        Self::try_from(request)
    }

    /// Text sent to the embedding model: available time followed by every
    /// participant's answer, one per line, in participant order.
    pub fn embedding_text(&self) -> String {
        std::iter::once(self.available_time.as_str())
            .chain(self.participants.iter().map(|p| p.raw_answer.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All participants' transcripts in participant order
    pub fn transcripts(&self) -> String {
        self.participants
            .iter()
            .map(|p| p.transcript.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TryFrom<RecommendationRequest> for PreferenceSet {
    type Error = AppError;

    fn try_from(request: RecommendationRequest) -> AppResult<Self> {
        if request.people_responses.is_empty() {
            return Err(AppError::MalformedRequest(
                "peopleResponses must contain at least one entry".to_string(),
            ));
        }

        let participants = request
            .people_responses
            .into_iter()
            .map(|response| ParticipantResponse {
                raw_answer: response.user_responses,
                transcript: response.stringified_query_and_responses,
            })
            .collect();

        Ok(Self {
            number_of_people: request.movie_set_up_preferences.number_of_people,
            available_time: request.movie_set_up_preferences.time,
            participants,
        })
    }
}
