/// OpenAPI documentation generation.
pub mod documentation;
/// Core duel orchestration verbs and per-match serialization.
pub mod duel_service;
/// Health check service.
pub mod health_service;
/// Queue admission and opportunistic pairing.
pub mod matchmaking;
/// Deadline supervision for answering phases and record cleanup.
pub mod timeout;
/// WebSocket connection and message handling service.
pub mod websocket_service;
