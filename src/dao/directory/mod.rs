//! Read-only contracts to the rest of the quiz platform.
//!
//! The live-game core never owns quiz content or user accounts; it looks
//! both up through these narrow directories and treats the platform as the
//! source of truth.

pub mod http;
#[cfg(test)]
pub mod stub;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::storage::StorageResult;

/// A quiz as served by the platform, including the answer key.
///
/// The answer key never leaves the backend: outbound views are built from
/// [`crate::dto::session::QuestionView`], which strips it.
#[derive(Debug, Clone)]
pub struct Quiz {
    /// Quiz identifier.
    pub id: Uuid,
    /// Title shown to the host.
    pub title: String,
    /// Questions in play order.
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Look up a question by id.
    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Question at a play-order index.
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

/// A single question with its grading material.
#[derive(Debug, Clone)]
pub struct Question {
    /// Question identifier.
    pub id: Uuid,
    /// Prompt shown to participants.
    pub text: String,
    /// Choice options; empty for free-text questions.
    pub options: Vec<String>,
    /// Stored answer key: either the literal correct value or a zero-based
    /// index into `options`, kept as text either way.
    pub correct_answer: String,
    /// Base points awarded for a correct answer.
    pub points: u32,
    /// Time limit in seconds; the session settings may override it.
    pub time_limit: u32,
}

/// Display profile of a platform user.
#[derive(Debug, Clone)]
pub struct UserProfile {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Optional avatar.
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Roster display name: "First Last", trimmed when either is empty.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

/// Quiz content lookup. Read-only from the core's perspective.
pub trait QuizDirectory: Send + Sync {
    /// Fetch a quiz with its questions and answer keys.
    fn get_quiz<'a>(&'a self, id: Uuid) -> BoxFuture<'a, StorageResult<Option<Quiz>>>;
}

/// User profile lookup used to populate roster display fields at join time.
pub trait UserDirectory: Send + Sync {
    /// Fetch the display profile for a user.
    fn get_user_profile<'a>(&'a self, id: Uuid)
    -> BoxFuture<'a, StorageResult<Option<UserProfile>>>;
}
