//! In-memory session store backing the test suite and `STORE_BACKEND=memory`.

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{MutateOutcome, SessionStore, UpdateFn};
use crate::dao::storage::StorageResult;
use crate::session::code::GameCode;
use crate::session::model::Session;

/// `DashMap`-backed store. Mutations run under the map's entry guard, so
/// concurrent writers to the same session serialize instead of racing; a
/// `Conflict` outcome is never produced.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Uuid, Session>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn insert<'a>(&'a self, session: Session) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn find<'a>(&'a self, id: Uuid) -> BoxFuture<'a, StorageResult<Option<Session>>> {
        Box::pin(async move { Ok(self.sessions.get(&id).map(|entry| entry.value().clone())) })
    }

    fn find_by_code<'a>(
        &'a self,
        code: GameCode,
    ) -> BoxFuture<'a, StorageResult<Option<Session>>> {
        Box::pin(async move {
            let found = self
                .sessions
                .iter()
                .find(|entry| entry.status.is_live() && entry.game_code == code)
                .map(|entry| entry.value().clone());
            Ok(found)
        })
    }

    fn mutate<'a>(
        &'a self,
        id: Uuid,
        mut apply: UpdateFn<'a>,
    ) -> BoxFuture<'a, StorageResult<MutateOutcome>> {
        Box::pin(async move {
            let Some(mut entry) = self.sessions.get_mut(&id) else {
                return Ok(MutateOutcome::NotFound);
            };
            // Apply against a draft so a rejecting closure cannot leave a
            // half-mutated aggregate behind.
            let mut draft = entry.value().clone();
            match apply(&mut draft) {
                Err(guard) => Ok(MutateOutcome::Rejected(guard)),
                Ok(super::UpdateDecision::Noop) => {
                    Ok(MutateOutcome::Unchanged(entry.value().clone()))
                }
                Ok(super::UpdateDecision::Commit) => {
                    *entry = draft.clone();
                    Ok(MutateOutcome::Committed(draft))
                }
            }
        })
    }

    fn health_check<'a>(&'a self) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect<'a>(&'a self) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::session_store::UpdateDecision;
    use crate::session::model::{GameSettings, Participant};
    use crate::session::status::GuardError;

    fn seeded(code: &str) -> Session {
        Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            code.parse().unwrap(),
            GameSettings::default(),
        )
    }

    #[tokio::test]
    async fn find_reflects_prior_writes() {
        let store = MemorySessionStore::new();
        let session = seeded("111111");
        let id = session.id;
        store.insert(session).await.unwrap();

        let outcome = store
            .mutate(
                id,
                Box::new(|session| {
                    session
                        .join(Participant::new(Uuid::new_v4(), "Alice".into(), None))
                        .map(|_| UpdateDecision::Commit)
                }),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, MutateOutcome::Committed(_)));

        let read = store.find(id).await.unwrap().unwrap();
        assert_eq!(read.participants.len(), 1);
    }

    #[tokio::test]
    async fn code_lookup_skips_completed_sessions() {
        let store = MemorySessionStore::new();
        let mut finished = seeded("222222");
        finished
            .join(Participant::new(Uuid::new_v4(), "Alice".into(), None))
            .unwrap();
        finished.start().unwrap();
        finished.complete().unwrap();
        store.insert(finished).await.unwrap();

        let live = seeded("222222");
        let live_id = live.id;
        store.insert(live).await.unwrap();

        let found = store
            .find_by_code("222222".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, live_id);
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_stored_state_untouched() {
        let store = MemorySessionStore::new();
        let session = seeded("333333");
        let id = session.id;
        store.insert(session).await.unwrap();

        let outcome = store
            .mutate(
                id,
                Box::new(|session| {
                    // Mutate the draft, then reject: nothing may stick.
                    session.current_question_index = 99;
                    Err(GuardError::NotHost)
                }),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, MutateOutcome::Rejected(GuardError::NotHost)));

        let read = store.find(id).await.unwrap().unwrap();
        assert_eq!(read.current_question_index, 0);
    }

    #[tokio::test]
    async fn mutate_on_unknown_id_reports_not_found() {
        let store = MemorySessionStore::new();
        let outcome = store
            .mutate(Uuid::new_v4(), Box::new(|_| Ok(UpdateDecision::Noop)))
            .await
            .unwrap();
        assert!(matches!(outcome, MutateOutcome::NotFound));
    }
}
