//! Application-level configuration resolved from the environment.

use std::env;

use tracing::{info, warn};

/// Default port the HTTP server binds to.
const DEFAULT_PORT: u16 = 8080;
/// Default per-receiver buffer of a session broadcast channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;
/// Default platform API the directory clients talk to.
const DEFAULT_PLATFORM_API_URL: &str = "http://localhost:3000";

/// Which session-store backend to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// MongoDB (production default).
    Mongo {
        /// Connection URI.
        uri: String,
        /// Database name override.
        database: Option<String>,
    },
    /// Process-local store, for development and demos.
    Memory,
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the server listens on.
    pub port: u16,
    /// Session-store backend selection.
    pub store: StoreBackend,
    /// Base URL of the main platform API (quiz and user lookups).
    pub platform_api_url: String,
    /// Optional bearer token for the platform API.
    pub platform_api_token: Option<String>,
    /// Broadcast buffer size per subscribed connection.
    pub channel_capacity: usize,
}

impl AppConfig {
    /// Resolve the configuration from environment variables, logging every
    /// fallback so a misconfigured deployment is visible at startup.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let store = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("mongo") | Err(_) => StoreBackend::Mongo {
                uri: env::var("MONGO_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".into()),
                database: env::var("MONGO_DB").ok(),
            },
            Ok(other) => {
                warn!(backend = %other, "unknown STORE_BACKEND; falling back to mongo");
                StoreBackend::Mongo {
                    uri: env::var("MONGO_URI")
                        .unwrap_or_else(|_| "mongodb://localhost:27017".into()),
                    database: env::var("MONGO_DB").ok(),
                }
            }
        };

        let platform_api_url = env::var("PLATFORM_API_URL").unwrap_or_else(|_| {
            info!(url = DEFAULT_PLATFORM_API_URL, "PLATFORM_API_URL not set; using default");
            DEFAULT_PLATFORM_API_URL.into()
        });

        let channel_capacity = env::var("CHANNEL_CAPACITY")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|capacity| *capacity > 0)
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);

        Self {
            port,
            store,
            platform_api_url,
            platform_api_token: env::var("PLATFORM_API_TOKEN").ok(),
            channel_capacity,
        }
    }
}
