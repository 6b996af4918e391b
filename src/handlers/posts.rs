use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use super::throttle;
use crate::{
    AppState,
    audit::AuditEvent,
    auth::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    models::{
        AuditAction, ClubPost, CommentView, CreateCommentRequest, CreatePostRequest,
        LikeResponse, PostComment, PostListQuery, PostView, UpdatePostRequest,
    },
    permissions::{Capability, ClubAccess},
    rate_limit::EndpointClass,
};

/// Loads a post and the caller's access to the club that owns it.
async fn post_with_access(
    state: &AppState,
    post_id: Uuid,
    viewer: Option<&AuthUser>,
) -> AppResult<(ClubPost, ClubAccess)> {
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::not_found("post"))?;
    let access = ClubAccess::load(state.repo.as_ref(), post.club_id, viewer).await?;
    Ok((post, access))
}

/// Loads a comment, its parent post and the caller's access to the club.
async fn comment_with_access(
    state: &AppState,
    comment_id: Uuid,
    viewer: &AuthUser,
) -> AppResult<(PostComment, ClubPost, ClubAccess)> {
    let comment = state
        .repo
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("comment"))?;
    let (post, access) = post_with_access(state, comment.post_id, Some(viewer)).await?;
    Ok((comment, post, access))
}

// --- Feed ---

/// list_posts
///
/// Club feed: every pinned post on the first page, then up to `limit` newest unpinned
/// posts. Pass the `created_at` and `id` of the last post shown as `before` and
/// `before_id` to fetch the next page.
#[utoipa::path(
    get,
    path = "/clubs/{id}/posts",
    params(("id" = Uuid, Path, description = "Club ID"), PostListQuery),
    responses(
        (status = 200, description = "Feed page", body = [PostView]),
        (status = 403, description = "Private club", body = crate::error::ErrorBody)
    )
)]
pub async fn list_posts(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
    Query(query): Query<PostListQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let access = ClubAccess::load(state.repo.as_ref(), club_id, viewer.as_ref()).await?;
    access.require_view_content()?;

    let posts = state
        .repo
        .list_post_views(
            club_id,
            viewer.as_ref().map(|u| u.id.as_str()),
            query.cursor(),
            query.effective_limit(),
        )
        .await?;
    Ok(Json(posts))
}

#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 200, description = "Post", body = PostView))
)]
pub async fn get_post(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostView>> {
    let (_, access) = post_with_access(&state, id, viewer.as_ref()).await?;
    access.require_view_content()?;

    let view = state
        .repo
        .get_post_view(id, viewer.as_ref().map(|u| u.id.as_str()))
        .await?
        .ok_or_else(|| AppError::not_found("post"))?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/clubs/{id}/posts",
    params(("id" = Uuid, Path, description = "Club ID")),
    request_body = CreatePostRequest,
    responses((status = 201, description = "Created", body = PostView))
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    throttle(&state, &user, EndpointClass::Post)?;
    let access = ClubAccess::load(state.repo.as_ref(), club_id, Some(&user)).await?;
    access.require(Capability::PostCreate)?;
    payload.validate()?;

    let now = Utc::now();
    let post = ClubPost {
        id: Uuid::new_v4(),
        club_id,
        author_id: user.id.clone(),
        content: payload.content.trim().to_string(),
        media_url: payload.media_url,
        is_pinned: false,
        created_at: now,
        updated_at: now,
    };
    let post = state.repo.insert_post(&post).await?;
    tracing::debug!(post_id = %post.id, club_id = %club_id, "post created");

    let view = state
        .repo
        .get_post_view(post.id, Some(&user.id))
        .await?
        .ok_or_else(|| AppError::Internal(format!("post {} vanished after insert", post.id)))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// update_post
///
/// Author only; moderators can delete but not rewrite someone else's post.
#[utoipa::path(
    patch,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses((status = 200, description = "Updated", body = ClubPost))
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<Json<ClubPost>> {
    throttle(&state, &user, EndpointClass::Post)?;
    let (post, _) = post_with_access(&state, id, Some(&user)).await?;
    if post.author_id != user.id {
        return Err(AppError::forbidden("only the author can edit this post"));
    }
    payload.validate()?;

    let trimmed = UpdatePostRequest {
        content: payload.content.map(|c| c.trim().to_string()),
        media_url: payload.media_url,
    };
    let post = state
        .repo
        .update_post(id, &trimmed)
        .await?
        .ok_or_else(|| AppError::not_found("post"))?;
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (post, access) = post_with_access(&state, id, Some(&user)).await?;
    let own = post.author_id == user.id;
    if !own {
        access.require(Capability::ContentModerate)?;
    }

    if !state.repo.delete_post(id).await? {
        return Err(AppError::not_found("post"));
    }

    if !own {
        state
            .audit
            .record(
                AuditEvent::club(post.club_id, &user.id, AuditAction::PostDeleted, "post", id)
                    .with_metadata(serde_json::json!({ "author_id": post.author_id })),
            )
            .await;
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn set_pinned(
    user: AuthUser,
    state: AppState,
    id: Uuid,
    pinned: bool,
) -> AppResult<Json<ClubPost>> {
    let (post, access) = post_with_access(&state, id, Some(&user)).await?;
    access.require(Capability::ContentModerate)?;

    let updated = state
        .repo
        .set_post_pinned(id, pinned)
        .await?
        .ok_or_else(|| AppError::not_found("post"))?;

    let action = if pinned {
        AuditAction::PostPinned
    } else {
        AuditAction::PostUnpinned
    };
    state
        .audit
        .record(AuditEvent::club(post.club_id, &user.id, action, "post", id))
        .await;

    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/posts/{id}/pin",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 200, description = "Pinned", body = ClubPost))
)]
pub async fn pin_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClubPost>> {
    set_pinned(user, state, id, true).await
}

#[utoipa::path(
    delete,
    path = "/posts/{id}/pin",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 200, description = "Unpinned", body = ClubPost))
)]
pub async fn unpin_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClubPost>> {
    set_pinned(user, state, id, false).await
}

// --- Likes ---

/// like_post
///
/// Returns the authoritative `{ liked, like_count }` so an optimistic client cache can
/// reconcile. Liking twice is a `CONFLICT`.
#[utoipa::path(
    post,
    path = "/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Liked", body = LikeResponse),
        (status = 409, description = "Already liked", body = crate::error::ErrorBody)
    )
)]
pub async fn like_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeResponse>> {
    throttle(&state, &user, EndpointClass::Reaction)?;
    let (_, access) = post_with_access(&state, id, Some(&user)).await?;
    access.require(Capability::ReactionCreate)?;

    if !state.repo.like_post(id, &user.id).await? {
        return Err(AppError::conflict("post already liked"));
    }
    let like_count = state.repo.post_like_count(id).await?;
    Ok(Json(LikeResponse {
        liked: true,
        like_count,
    }))
}

#[utoipa::path(
    delete,
    path = "/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Unliked", body = LikeResponse),
        (status = 404, description = "Not liked", body = crate::error::ErrorBody)
    )
)]
pub async fn unlike_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeResponse>> {
    throttle(&state, &user, EndpointClass::Reaction)?;
    let (_, access) = post_with_access(&state, id, Some(&user)).await?;
    access.require(Capability::ReactionCreate)?;

    if !state.repo.unlike_post(id, &user.id).await? {
        return Err(AppError::not_found("like"));
    }
    let like_count = state.repo.post_like_count(id).await?;
    Ok(Json(LikeResponse {
        liked: false,
        like_count,
    }))
}

// --- Comments ---

#[utoipa::path(
    get,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 200, description = "Comments, oldest first", body = [CommentView]))
)]
pub async fn list_comments(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<CommentView>>> {
    let (_, access) = post_with_access(&state, id, viewer.as_ref()).await?;
    access.require_view_content()?;

    let comments = state
        .repo
        .list_comment_views(id, viewer.as_ref().map(|u| u.id.as_str()))
        .await?;
    Ok(Json(comments))
}

#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses((status = 201, description = "Created", body = CommentView))
)]
pub async fn create_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    throttle(&state, &user, EndpointClass::Comment)?;
    let (_, access) = post_with_access(&state, id, Some(&user)).await?;
    access.require(Capability::CommentCreate)?;
    payload.validate()?;

    let comment = PostComment {
        id: Uuid::new_v4(),
        post_id: id,
        author_id: user.id.clone(),
        content: payload.content.trim().to_string(),
        created_at: Utc::now(),
    };
    let comment = state.repo.insert_comment(&comment).await?;

    let author_name = state
        .repo
        .get_user(&user.id)
        .await?
        .map(|u| u.display_name)
        .unwrap_or_else(|| user.id.clone());

    Ok((
        StatusCode::CREATED,
        Json(CommentView {
            comment,
            author_name,
            like_count: 0,
            liked_by_viewer: false,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (comment, post, access) = comment_with_access(&state, id, &user).await?;
    let own = comment.author_id == user.id;
    if !own {
        access.require(Capability::ContentModerate)?;
    }

    if !state.repo.delete_comment(id).await? {
        return Err(AppError::not_found("comment"));
    }

    if !own {
        state
            .audit
            .record(
                AuditEvent::club(post.club_id, &user.id, AuditAction::CommentDeleted, "comment", id)
                    .with_metadata(serde_json::json!({
                        "post_id": post.id,
                        "author_id": comment.author_id,
                    })),
            )
            .await;
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/comments/{id}/like",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Liked", body = LikeResponse),
        (status = 409, description = "Already liked", body = crate::error::ErrorBody)
    )
)]
pub async fn like_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeResponse>> {
    throttle(&state, &user, EndpointClass::Reaction)?;
    let (_, _, access) = comment_with_access(&state, id, &user).await?;
    access.require(Capability::ReactionCreate)?;

    if !state.repo.like_comment(id, &user.id).await? {
        return Err(AppError::conflict("comment already liked"));
    }
    let like_count = state.repo.comment_like_count(id).await?;
    Ok(Json(LikeResponse {
        liked: true,
        like_count,
    }))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}/like",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Unliked", body = LikeResponse),
        (status = 404, description = "Not liked", body = crate::error::ErrorBody)
    )
)]
pub async fn unlike_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeResponse>> {
    throttle(&state, &user, EndpointClass::Reaction)?;
    let (_, _, access) = comment_with_access(&state, id, &user).await?;
    access.require(Capability::ReactionCreate)?;

    if !state.repo.unlike_comment(id, &user.id).await? {
        return Err(AppError::not_found("like"));
    }
    let like_count = state.repo.comment_like_count(id).await?;
    Ok(Json(LikeResponse {
        liked: false,
        like_count,
    }))
}
