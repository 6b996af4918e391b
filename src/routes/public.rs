use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read endpoints reachable without a token. A valid token is still honoured so
/// members see private-club content and their own like/RSVP flags; visibility is
/// decided per request by `ClubAccess`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers. Not rate limited.
        .route("/health", get(handlers::health))
        // --- Clubs ---
        .route("/clubs", get(handlers::clubs::list_clubs))
        .route("/clubs/{id}", get(handlers::clubs::get_club))
        .route("/clubs/{id}/members", get(handlers::clubs::list_members))
        // --- Feed ---
        .route("/clubs/{id}/posts", get(handlers::posts::list_posts))
        .route("/posts/{id}", get(handlers::posts::get_post))
        .route("/posts/{id}/comments", get(handlers::posts::list_comments))
        // --- Events ---
        .route("/clubs/{id}/events", get(handlers::events::list_events))
        .route("/events/{id}", get(handlers::events::get_event))
        .route("/events/{id}/attendees", get(handlers::events::list_attendees))
        // --- Challenges ---
        .route("/clubs/{id}/challenges", get(handlers::challenges::list_challenges))
        .route("/challenges/{id}", get(handlers::challenges::get_challenge))
        .route(
            "/challenges/{id}/leaderboard",
            get(handlers::challenges::leaderboard),
        )
}
