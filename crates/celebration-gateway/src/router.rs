use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::SharedState;

/// Build the main application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/status", get(api::status))
        .route(
            "/api/messages",
            get(api::list_messages).post(api::submit_message),
        )
        .route("/api/memories", get(api::list_memories))
        .route("/api/memories/text", post(api::submit_text_memory))
        .route("/api/memories/{id}", delete(api::delete_memory))
        .route("/api/stats", get(api::stats))
        .route("/api/gallery/folders", get(api::gallery_folders))
        .route("/api/gallery/images", get(api::gallery_images))
        .route("/api/cancel-reservation", post(api::cancel_reservation))
        .route("/api/donations/confirm", post(api::confirm_donation))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
