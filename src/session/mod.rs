//! Shared application state and the session domain model.

pub mod channels;
pub mod code;
pub mod model;
pub mod status;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::config::AppConfig;
use crate::dao::directory::{QuizDirectory, UserDirectory};
use crate::dao::session_store::SessionStore;
use crate::error::ServiceError;

pub use self::channels::ChannelRegistry;

/// Cheaply clonable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the installable session store, the directory
/// handles, and the per-session broadcast channels.
pub struct AppState {
    config: AppConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    quizzes: Arc<dyn QuizDirectory>,
    users: Arc<dyn UserDirectory>,
    channels: ChannelRegistry,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`].
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed by the supervisor.
    pub fn new(
        config: AppConfig,
        quizzes: Arc<dyn QuizDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let channels = ChannelRegistry::new(config.channel_capacity);
        Arc::new(Self {
            config,
            session_store: RwLock::new(None),
            quizzes,
            users,
            channels,
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Session store handle, or [`ServiceError::Degraded`] when none is up.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag. Tracks storage health, not just presence: the
    /// supervisor flips it while an installed backend fails its checks.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag; idempotent on repeat values.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Quiz content lookup.
    pub fn quizzes(&self) -> &dyn QuizDirectory {
        self.quizzes.as_ref()
    }

    /// User profile lookup.
    pub fn users(&self) -> &dyn UserDirectory {
        self.users.as_ref()
    }

    /// Per-session broadcast channels used by the realtime gateway.
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }
}
