use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{SessionDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    session_store::{MutateOutcome, SessionStore, UpdateDecision, UpdateFn},
    storage::StorageResult,
};
use crate::session::{code::GameCode, model::Session};

const SESSION_COLLECTION_NAME: &str = "game_sessions";

/// Session store backed by a MongoDB collection.
///
/// Concurrency model: every document carries a `revision` counter; `mutate`
/// reads the document, applies the closure, and commits with a
/// `replace_one` conditioned on the revision it read. A lost race surfaces
/// as [`MutateOutcome::Conflict`] and the manager retries on a fresh read.
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        // The live-code lookup filters on (game_code, status); recycled codes
        // make a unique constraint impossible, so this is a plain index.
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"game_code": 1, "status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_code_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "game_code,status",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<SessionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<SessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn insert_session(&self, session: Session) -> MongoResult<()> {
        let id = session.id;
        let document = SessionDocument::from_session(session, 0);
        let collection = self.collection().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { id, source })?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> MongoResult<Option<Session>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        Ok(document.map(|doc| doc.into_session().0))
    }

    async fn find_session_by_code(&self, code: GameCode) -> MongoResult<Option<Session>> {
        let collection = self.collection().await;
        let filter = doc! {
            "game_code": code.as_str(),
            "status": { "$in": ["waiting", "active"] },
        };
        let document = collection
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::CodeLookup {
                code: code.as_str().to_owned(),
                source,
            })?;
        Ok(document.map(|doc| doc.into_session().0))
    }

    async fn mutate_session(
        &self,
        id: Uuid,
        apply: &mut UpdateFn<'_>,
    ) -> MongoResult<MutateOutcome> {
        let collection = self.collection().await;
        let Some(document) = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?
        else {
            return Ok(MutateOutcome::NotFound);
        };

        let (mut session, revision) = document.into_session();
        match apply(&mut session) {
            Err(guard) => Ok(MutateOutcome::Rejected(guard)),
            Ok(UpdateDecision::Noop) => Ok(MutateOutcome::Unchanged(session)),
            Ok(UpdateDecision::Commit) => {
                let next = SessionDocument::from_session(session.clone(), revision + 1);
                let filter = doc! {
                    "_id": uuid_as_binary(id),
                    "revision": revision,
                };
                let result = collection
                    .replace_one(filter, &next)
                    .await
                    .map_err(|source| MongoDaoError::SaveSession { id, source })?;

                if result.matched_count == 1 {
                    Ok(MutateOutcome::Committed(session))
                } else {
                    // Someone else committed between our read and write.
                    Ok(MutateOutcome::Conflict)
                }
            }
        }
    }
}

impl SessionStore for MongoSessionStore {
    fn insert<'a>(&'a self, session: Session) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move { self.insert_session(session).await.map_err(Into::into) })
    }

    fn find<'a>(&'a self, id: Uuid) -> BoxFuture<'a, StorageResult<Option<Session>>> {
        Box::pin(async move { self.find_session(id).await.map_err(Into::into) })
    }

    fn find_by_code<'a>(
        &'a self,
        code: GameCode,
    ) -> BoxFuture<'a, StorageResult<Option<Session>>> {
        Box::pin(async move { self.find_session_by_code(code).await.map_err(Into::into) })
    }

    fn mutate<'a>(
        &'a self,
        id: Uuid,
        mut apply: UpdateFn<'a>,
    ) -> BoxFuture<'a, StorageResult<MutateOutcome>> {
        Box::pin(async move { self.mutate_session(id, &mut apply).await.map_err(Into::into) })
    }

    fn health_check<'a>(&'a self) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move { self.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect<'a>(&'a self) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move { self.inner.reconnect().await.map_err(Into::into) })
    }
}
