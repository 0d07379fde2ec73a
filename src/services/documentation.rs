//! OpenAPI documentation generation.

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Versus Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::versus::player_status,
        crate::routes::versus::lobby_snapshot,
        crate::routes::versus::select_question,
        crate::routes::versus::answer_question,
        crate::routes::versus::leave_match,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::duel::StatusResponse,
            crate::dto::duel::LobbySnapshot,
            crate::dto::duel::SelectQuestionRequest,
            crate::dto::duel::AnswerQuestionRequest,
            crate::dto::duel::LeaveRequest,
            crate::dto::duel::SelectionView,
            crate::dto::duel::AnswerView,
            crate::dto::duel::MatchFinishedPayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "versus", description = "Duel matchmaking and gameplay actions"),
        (name = "duels", description = "WebSocket operations for duel clients"),
    )
)]
pub struct ApiDoc;
