use axum::{Json, extract::State};

use super::throttle;
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{UpdateProfileRequest, User},
    rate_limit::EndpointClass,
};

/// get_me
///
/// The caller's profile. The row is created on first authentication, so this
/// always resolves for a valid token.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody)
    )
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<User>> {
    let profile = state
        .repo
        .get_user(&user.id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    Ok(Json(profile))
}

#[utoipa::path(
    patch,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated profile", body = User))
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<User>> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    payload.validate()?;

    let trimmed = UpdateProfileRequest {
        display_name: payload.display_name.map(|n| n.trim().to_string()),
        avatar_url: payload.avatar_url,
    };
    let profile = state
        .repo
        .update_profile(&user.id, &trimmed)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    Ok(Json(profile))
}
