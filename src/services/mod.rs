/// OpenAPI documentation generation.
pub mod documentation;
/// Session-scoped broadcast event constructors.
pub mod events;
/// Pure grading and scoring rules.
pub mod grading;
/// Health check service.
pub mod health_service;
/// The game session manager: lifecycle, roster, and answer operations.
pub mod session_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and command handling.
pub mod websocket_service;
