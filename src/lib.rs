use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services.
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod rate_limit;
pub mod repository;
pub mod storage;

// Router segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use audit::AuditLogger;
pub use config::AppConfig;
pub use rate_limit::RateLimiter;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::clubs::list_clubs, handlers::clubs::get_club, handlers::clubs::my_clubs,
        handlers::clubs::create_club, handlers::clubs::update_club, handlers::clubs::delete_club,
        handlers::clubs::join_club, handlers::clubs::leave_club, handlers::clubs::list_members,
        handlers::clubs::update_member_role, handlers::clubs::remove_member,
        handlers::clubs::list_join_requests, handlers::clubs::cancel_my_request,
        handlers::clubs::approve_join_request, handlers::clubs::reject_join_request,
        handlers::clubs::list_bans, handlers::clubs::ban_member, handlers::clubs::unban_member,
        handlers::clubs::club_audit_log,
        handlers::posts::list_posts, handlers::posts::get_post, handlers::posts::create_post,
        handlers::posts::update_post, handlers::posts::delete_post, handlers::posts::pin_post,
        handlers::posts::unpin_post, handlers::posts::like_post, handlers::posts::unlike_post,
        handlers::posts::list_comments, handlers::posts::create_comment,
        handlers::posts::delete_comment, handlers::posts::like_comment,
        handlers::posts::unlike_comment,
        handlers::events::list_events, handlers::events::get_event,
        handlers::events::create_event, handlers::events::update_event,
        handlers::events::delete_event, handlers::events::attend_event,
        handlers::events::cancel_attendance, handlers::events::list_attendees,
        handlers::challenges::list_challenges, handlers::challenges::get_challenge,
        handlers::challenges::create_challenge, handlers::challenges::delete_challenge,
        handlers::challenges::join_challenge, handlers::challenges::leave_challenge,
        handlers::challenges::submit_entry, handlers::challenges::leaderboard,
        handlers::users::get_me, handlers::users::update_me,
        handlers::admin::get_site_stats, handlers::admin::set_user_role,
        handlers::admin::admin_audit_log,
        handlers::uploads::get_presigned_url,
    ),
    components(
        schemas(
            error::ErrorBody, permissions::Capability, permissions::ViewerPermissions,
            handlers::clubs::ClubDetail,
            models::User, models::SiteRole, models::UpdateProfileRequest,
            models::SetSiteRoleRequest, models::SiteStats,
            models::Club, models::ClubVisibility, models::ClubRole, models::ClubMember,
            models::MemberView, models::ClubSummary, models::ClubJoinRequest,
            models::JoinRequestStatus, models::ClubBan, models::CreateClubRequest,
            models::UpdateClubRequest, models::JoinClubRequest, models::JoinClubResponse,
            models::JoinOutcome, models::UpdateMemberRoleRequest, models::BanMemberRequest,
            models::ClubPost, models::PostComment, models::PostView, models::CommentView,
            models::LikeResponse, models::CreatePostRequest, models::UpdatePostRequest,
            models::CreateCommentRequest,
            models::ClubEvent, models::EventAttendee, models::EventView, models::AttendeeView,
            models::AttendanceStatus, models::CreateEventRequest, models::UpdateEventRequest,
            models::AttendEventRequest,
            models::Challenge, models::RankingOrder, models::ChallengeParticipant,
            models::LeaderboardEntry, models::ChallengeView, models::LeaderboardRow,
            models::CreateChallengeRequest, models::SubmitEntryRequest,
            models::AuditLog, models::AuditAction,
            models::UploadPurpose, models::PresignedUrlRequest, models::PresignedUrlResponse,
        )
    ),
    tags(
        (name = "redline", description = "Redline automotive club platform API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployment, in-memory locally and in tests.
    pub repo: RepositoryState,
    /// Object storage for presigned uploads.
    pub storage: StorageState,
    pub config: AppConfig,
    /// Process-local sliding-window limiter, built from `config.rate_limit`.
    pub limiter: Arc<RateLimiter>,
    pub audit: AuditLogger,
}

impl AppState {
    /// Wires the limiter and audit logger from `config` and `repo`.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let audit = AuditLogger::new(repo.clone());
        Self {
            repo,
            storage,
            config,
            limiter,
            audit,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless an `AuthUser` can be resolved. Handlers in the
/// authenticated router extract `AuthUser` again for the caller's identity.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the public, authenticated and admin routers, then applies the read
/// throttle and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Site-role checks run inside the handlers.
        .nest("/admin", admin::admin_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::read_rate_limit,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span with method, URI and the `x-request-id` set by
/// `SetRequestIdLayer`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
