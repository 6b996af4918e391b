use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Site administration, nested under `/admin`. Authentication is enforced by the
/// `AuthUser` extractor; the ADMIN / SUPER_ADMIN checks run inside each handler.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Dashboard counters (users, clubs, posts, events, challenges).
        .route("/stats", get(handlers::admin::get_site_stats))
        // PUT /admin/users/{id}/role
        // SUPER_ADMIN only. Audited as SITE_ROLE_CHANGED.
        .route("/users/{id}/role", put(handlers::admin::set_user_role))
        // GET /admin/audit-log
        // Every club and site-level audit entry, newest first.
        .route("/audit-log", get(handlers::admin::admin_audit_log))
}
