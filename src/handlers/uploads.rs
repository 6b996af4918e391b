use axum::{Json, extract::State};
use uuid::Uuid;

use super::throttle;
use crate::{
    AppState,
    auth::AuthUser,
    error::AppResult,
    models::{PresignedUrlRequest, PresignedUrlResponse},
    rate_limit::EndpointClass,
};

/// get_presigned_url
///
/// Returns a time-limited PUT URL for direct-to-bucket uploads. The object key is
/// generated server-side (`<folder>/<uuid>.<ext>`); the client stores
/// `resource_key` on the post, club or challenge entry once the upload succeeds.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "Presigned URL generated", body = PresignedUrlResponse),
        (status = 400, description = "Unsupported file type", body = crate::error::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody),
        (status = 500, description = "Storage unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    throttle(&state, &user, EndpointClass::Upload)?;
    payload.validate()?;

    let resource_key = format!(
        "{}/{}.{}",
        payload.purpose.folder(),
        Uuid::new_v4(),
        payload.extension()
    );

    let upload_url = state
        .storage
        .get_presigned_upload_url(&resource_key, &payload.file_type)
        .await?;

    tracing::debug!(user_id = %user.id, key = %resource_key, "issued presigned upload url");

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key,
    }))
}
