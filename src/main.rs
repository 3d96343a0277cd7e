//! QuizHive live-game backend entrypoint wiring REST, WebSocket, and storage
//! layers.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod session;

use config::{AppConfig, StoreBackend};
use dao::directory::http::HttpDirectory;
use dao::session_store::memory::MemorySessionStore;
use session::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let port = config.port;

    let directory = Arc::new(HttpDirectory::new(
        &config.platform_api_url,
        config.platform_api_token.as_deref(),
    ));
    let app_state = AppState::new(config, directory.clone(), directory);

    bootstrap_store(app_state.clone()).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured session store: the memory backend immediately, the
/// MongoDB backend through the background supervisor with backoff.
async fn bootstrap_store(state: SharedState) {
    match state.config().store.clone() {
        StoreBackend::Memory => {
            info!("using the in-memory session store");
            state
                .install_session_store(Arc::new(MemorySessionStore::new()))
                .await;
        }
        StoreBackend::Mongo { uri, database } => spawn_mongo_supervisor(state, uri, database),
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState, uri: String, database: Option<String>) {
    use dao::session_store::SessionStore;
    use dao::session_store::mongodb::{MongoConfig, MongoSessionStore};
    use dao::storage::StorageError;

    tokio::spawn(services::storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let database = database.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, database.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoSessionStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn SessionStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(state: SharedState, _uri: String, _database: Option<String>) {
    tracing::error!("built without the `mongo-store` feature; using the in-memory store instead");
    tokio::spawn(async move {
        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
    });
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
