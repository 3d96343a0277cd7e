use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the QuizHive live-game backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::session::get_session,
        crate::routes::session::get_current_question,
        crate::routes::session::get_results,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientCommand,
            crate::dto::ws::ServerReply,
            crate::dto::ws::SessionEvent,
            crate::dto::session::SessionSummary,
            crate::dto::session::ParticipantSummary,
            crate::dto::session::QuestionView,
            crate::dto::session::LeaderboardEntry,
            crate::dto::session::SessionResults,
            crate::dto::session::ParticipantResult,
            crate::dto::session::AnswerSummary,
            crate::session::model::GameSettings,
            crate::session::status::SessionStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Historical and progress reads over game sessions"),
        (name = "game", description = "WebSocket gateway for live game commands"),
    )
)]
pub struct ApiDoc;
