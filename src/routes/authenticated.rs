use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

/// Authenticated Router Module
///
/// Routes that require a resolved `AuthUser`. The router is wrapped in the
/// authentication layer in `create_router`; handlers additionally check club
/// capabilities and draw from their write rate-limit bucket.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile ---
        .route(
            "/me",
            get(handlers::users::get_me).patch(handlers::users::update_me),
        )
        .route("/me/clubs", get(handlers::clubs::my_clubs))
        // POST /upload/presigned
        // Short-lived PUT URL for direct-to-bucket media uploads.
        .route("/upload/presigned", post(handlers::uploads::get_presigned_url))
        // --- Clubs ---
        .route("/clubs", post(handlers::clubs::create_club))
        .route(
            "/clubs/{id}",
            patch(handlers::clubs::update_club).delete(handlers::clubs::delete_club),
        )
        .route("/clubs/{id}/join", post(handlers::clubs::join_club))
        .route("/clubs/{id}/leave", post(handlers::clubs::leave_club))
        .route(
            "/clubs/{id}/members/{user_id}",
            patch(handlers::clubs::update_member_role).delete(handlers::clubs::remove_member),
        )
        // --- Join requests ---
        .route(
            "/clubs/{id}/join-requests",
            get(handlers::clubs::list_join_requests),
        )
        .route(
            "/clubs/{id}/join-requests/mine",
            delete(handlers::clubs::cancel_my_request),
        )
        .route(
            "/clubs/{id}/join-requests/{request_id}/approve",
            post(handlers::clubs::approve_join_request),
        )
        .route(
            "/clubs/{id}/join-requests/{request_id}/reject",
            post(handlers::clubs::reject_join_request),
        )
        // --- Bans & audit ---
        .route(
            "/clubs/{id}/bans",
            get(handlers::clubs::list_bans).post(handlers::clubs::ban_member),
        )
        .route(
            "/clubs/{id}/bans/{user_id}",
            delete(handlers::clubs::unban_member),
        )
        .route("/clubs/{id}/audit-log", get(handlers::clubs::club_audit_log))
        // --- Feed ---
        .route("/clubs/{id}/posts", post(handlers::posts::create_post))
        .route(
            "/posts/{id}",
            patch(handlers::posts::update_post).delete(handlers::posts::delete_post),
        )
        .route(
            "/posts/{id}/pin",
            post(handlers::posts::pin_post).delete(handlers::posts::unpin_post),
        )
        .route(
            "/posts/{id}/like",
            post(handlers::posts::like_post).delete(handlers::posts::unlike_post),
        )
        .route("/posts/{id}/comments", post(handlers::posts::create_comment))
        .route("/comments/{id}", delete(handlers::posts::delete_comment))
        .route(
            "/comments/{id}/like",
            post(handlers::posts::like_comment).delete(handlers::posts::unlike_comment),
        )
        // --- Events ---
        .route("/clubs/{id}/events", post(handlers::events::create_event))
        .route(
            "/events/{id}",
            patch(handlers::events::update_event).delete(handlers::events::delete_event),
        )
        .route(
            "/events/{id}/attendance",
            put(handlers::events::attend_event).delete(handlers::events::cancel_attendance),
        )
        // --- Challenges ---
        .route(
            "/clubs/{id}/challenges",
            post(handlers::challenges::create_challenge),
        )
        .route(
            "/challenges/{id}",
            delete(handlers::challenges::delete_challenge),
        )
        .route("/challenges/{id}/join", post(handlers::challenges::join_challenge))
        .route("/challenges/{id}/leave", post(handlers::challenges::leave_challenge))
        .route("/challenges/{id}/entries", post(handlers::challenges::submit_entry))
}
