//! HTTP implementations of the platform directories.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use super::{Question, Quiz, QuizDirectory, UserDirectory, UserProfile};
use crate::dao::storage::{StorageError, StorageResult};

/// Directory client calling the main platform's REST API.
///
/// Implements both lookup contracts against `{base_url}/api/...`; a missing
/// document is a 404 and maps to `None`, any other failure to
/// [`StorageError`].
#[derive(Clone)]
pub struct HttpDirectory {
    client: Client,
    base_url: Arc<str>,
    bearer_token: Option<Arc<str>>,
}

impl HttpDirectory {
    /// Build a client for the platform API at `base_url`.
    pub fn new(base_url: &str, bearer_token: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: Arc::from(base_url.trim_end_matches('/')),
            bearer_token: bearer_token.map(Arc::from),
        }
    }

    async fn get_json<T>(&self, path: &str) -> StorageResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token.as_ref());
        }

        let response = request.send().await.map_err(|source| {
            StorageError::unavailable(format!("platform API request to `{url}` failed"), source)
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let payload = response.json::<T>().await.map_err(|source| {
                    StorageError::unavailable(
                        format!("platform API response from `{url}` was malformed"),
                        source,
                    )
                })?;
                Ok(Some(payload))
            }
            status => Err(StorageError::unavailable(
                format!("platform API answered `{url}` with status {status}"),
                response.error_for_status().unwrap_err(),
            )),
        }
    }
}

impl QuizDirectory for HttpDirectory {
    fn get_quiz<'a>(&'a self, id: Uuid) -> BoxFuture<'a, StorageResult<Option<Quiz>>> {
        Box::pin(async move {
            let payload = self.get_json::<QuizPayload>(&format!("api/quizzes/{id}")).await?;
            Ok(payload.map(Into::into))
        })
    }
}

impl UserDirectory for HttpDirectory {
    fn get_user_profile<'a>(
        &'a self,
        id: Uuid,
    ) -> BoxFuture<'a, StorageResult<Option<UserProfile>>> {
        Box::pin(async move {
            let payload = self
                .get_json::<UserProfilePayload>(&format!("api/users/{id}/profile"))
                .await?;
            Ok(payload.map(Into::into))
        })
    }
}

/// Wire shape of a quiz as the platform serves it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizPayload {
    #[serde(alias = "_id")]
    id: Uuid,
    title: String,
    questions: Vec<QuestionPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionPayload {
    question_id: Uuid,
    question_text: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: CorrectAnswerPayload,
    points: u32,
    time_limit: u32,
}

/// The platform stores the answer key either as literal text or as a
/// zero-based option index; both land here as text and the grading layer
/// handles the difference.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CorrectAnswerPayload {
    Index(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfilePayload {
    first_name: String,
    last_name: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<QuizPayload> for Quiz {
    fn from(value: QuizPayload) -> Self {
        Self {
            id: value.id,
            title: value.title,
            questions: value.questions.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<QuestionPayload> for Question {
    fn from(value: QuestionPayload) -> Self {
        Self {
            id: value.question_id,
            text: value.question_text,
            options: value.options,
            correct_answer: match value.correct_answer {
                CorrectAnswerPayload::Index(index) => index.to_string(),
                CorrectAnswerPayload::Text(text) => text,
            },
            points: value.points,
            time_limit: value.time_limit,
        }
    }
}

impl From<UserProfilePayload> for UserProfile {
    fn from(value: UserProfilePayload) -> Self {
        Self {
            first_name: value.first_name,
            last_name: value.last_name,
            avatar_url: value.avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_payload_accepts_text_answer_keys() {
        let raw = r#"{
            "id": "6b9f62a5-51fd-4a5c-a380-0f5e1c8a3f4e",
            "title": "Capitals",
            "questions": [{
                "questionId": "0d6df6a1-7f3c-45a7-9ad4-3f0b9a3e3e21",
                "questionText": "Capital of France?",
                "options": ["London", "Paris"],
                "correctAnswer": "Paris",
                "points": 10,
                "timeLimit": 30
            }]
        }"#;
        let quiz: Quiz = serde_json::from_str::<QuizPayload>(raw).unwrap().into();
        assert_eq!(quiz.questions[0].correct_answer, "Paris");
    }

    #[test]
    fn quiz_payload_accepts_index_answer_keys() {
        let raw = r#"{
            "id": "6b9f62a5-51fd-4a5c-a380-0f5e1c8a3f4e",
            "title": "Capitals",
            "questions": [{
                "questionId": "0d6df6a1-7f3c-45a7-9ad4-3f0b9a3e3e21",
                "questionText": "Capital of France?",
                "options": ["London", "Paris"],
                "correctAnswer": 1,
                "points": 10,
                "timeLimit": 30
            }]
        }"#;
        let quiz: Quiz = serde_json::from_str::<QuizPayload>(raw).unwrap().into();
        assert_eq!(quiz.questions[0].correct_answer, "1");
    }
}
