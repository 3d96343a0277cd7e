//! Session Store: durable storage for [`Session`] aggregates.
//!
//! The `mutate` primitive is the single concurrency boundary of the whole
//! core. Every operation that changes roster, answers, score, or lifecycle
//! state routes through an atomic read-modify-write against the current
//! persisted value; nothing ever writes back a previously-read copy.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::storage::StorageResult;
use crate::session::code::GameCode;
use crate::session::model::Session;
use crate::session::status::GuardError;

/// What a mutation closure wants done with the aggregate it just inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Persist the modified session.
    Commit,
    /// Leave the stored session untouched (idempotent no-op path).
    Noop,
}

/// Closure applied to the freshly-read aggregate inside [`SessionStore::mutate`].
///
/// Must be synchronous: backends may run it while holding an entry guard.
/// `FnMut` because an optimistic backend re-applies it after losing a write
/// race.
pub type UpdateFn<'a> =
    Box<dyn FnMut(&mut Session) -> Result<UpdateDecision, GuardError> + Send + 'a>;

/// Result of one [`SessionStore::mutate`] round-trip.
#[derive(Debug)]
pub enum MutateOutcome {
    /// The closure committed and the write is durable; the returned session
    /// is the new stored state.
    Committed(Session),
    /// The closure declined to write; the returned session is the stored
    /// state as read.
    Unchanged(Session),
    /// The closure refused the mutation; nothing was written.
    Rejected(GuardError),
    /// No session with the requested id exists.
    NotFound,
    /// Another writer won the race. The caller should retry; the closure was
    /// already rolled back with the write.
    Conflict,
}

/// Abstraction over the persistence layer for game sessions.
pub trait SessionStore: Send + Sync {
    /// Persist a freshly-created session.
    fn insert<'a>(&'a self, session: Session) -> BoxFuture<'a, StorageResult<()>>;

    /// Point lookup by id, reflecting all prior writes to the same id.
    fn find<'a>(&'a self, id: Uuid) -> BoxFuture<'a, StorageResult<Option<Session>>>;

    /// Lookup by game code, restricted to sessions still `waiting` or
    /// `active`; recycled codes therefore resolve to the one live session.
    fn find_by_code<'a>(&'a self, code: GameCode)
    -> BoxFuture<'a, StorageResult<Option<Session>>>;

    /// Atomic read-modify-write against the current persisted value.
    fn mutate<'a>(
        &'a self,
        id: Uuid,
        apply: UpdateFn<'a>,
    ) -> BoxFuture<'a, StorageResult<MutateOutcome>>;

    /// Cheap liveness probe of the backend.
    fn health_check<'a>(&'a self) -> BoxFuture<'a, StorageResult<()>>;

    /// Attempt to re-establish a broken backend connection.
    fn try_reconnect<'a>(&'a self) -> BoxFuture<'a, StorageResult<()>>;
}
