//! In-memory directories used as fixtures by the service tests.

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{Quiz, QuizDirectory, UserDirectory, UserProfile};
use crate::dao::storage::StorageResult;

/// Quiz directory backed by a map seeded from the test.
#[derive(Default)]
pub struct StubQuizDirectory {
    quizzes: DashMap<Uuid, Quiz>,
}

impl StubQuizDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a quiz under its own id.
    pub fn with_quiz(self, quiz: Quiz) -> Self {
        self.quizzes.insert(quiz.id, quiz);
        self
    }
}

impl QuizDirectory for StubQuizDirectory {
    fn get_quiz<'a>(&'a self, id: Uuid) -> BoxFuture<'a, StorageResult<Option<Quiz>>> {
        Box::pin(async move { Ok(self.quizzes.get(&id).map(|entry| entry.value().clone())) })
    }
}

/// User directory backed by a map seeded from the test.
#[derive(Default)]
pub struct StubUserDirectory {
    profiles: DashMap<Uuid, UserProfile>,
}

impl StubUserDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile for `user_id`.
    pub fn with_profile(self, user_id: Uuid, profile: UserProfile) -> Self {
        self.profiles.insert(user_id, profile);
        self
    }
}

impl UserDirectory for StubUserDirectory {
    fn get_user_profile<'a>(
        &'a self,
        id: Uuid,
    ) -> BoxFuture<'a, StorageResult<Option<UserProfile>>> {
        Box::pin(async move { Ok(self.profiles.get(&id).map(|entry| entry.value().clone())) })
    }
}
