use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::throttle;
use crate::{
    AppState,
    audit::AuditEvent,
    auth::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    models::{
        AuditAction, AuditLog, AuditLogQuery, BanMemberRequest, Club, ClubBan, ClubFilter,
        ClubJoinRequest, ClubMember, ClubRole, ClubSummary, ClubVisibility, CreateClubRequest,
        JoinClubRequest, JoinClubResponse, JoinOutcome, JoinRequestFilter, JoinRequestStatus,
        MemberView, UpdateClubRequest, UpdateMemberRoleRequest, slugify,
    },
    permissions::{Capability, ClubAccess, ViewerPermissions},
    rate_limit::EndpointClass,
    repository::Repository,
};

/// ClubDetail
///
/// GET /clubs/{id}: the summary plus what the caller may do in this club.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ClubDetail {
    pub summary: ClubSummary,
    pub permissions: ViewerPermissions,
}

/// Enriches clubs with member counts and the viewer's role / pending-request flag.
async fn summarize(
    repo: &dyn Repository,
    clubs: Vec<Club>,
    viewer: Option<&AuthUser>,
) -> AppResult<Vec<ClubSummary>> {
    let ids: Vec<Uuid> = clubs.iter().map(|c| c.id).collect();
    let counts = repo.member_counts(&ids).await?;
    let memberships = match viewer {
        Some(user) => repo.list_memberships(&user.id).await?,
        None => Vec::new(),
    };

    let mut summaries = Vec::with_capacity(clubs.len());
    for club in clubs {
        let viewer_role = memberships
            .iter()
            .find(|m| m.club_id == club.id)
            .map(|m| m.role);
        let viewer_request_pending = match viewer {
            Some(user) if viewer_role.is_none() && club.visibility == ClubVisibility::Private => {
                repo.find_pending_request(club.id, &user.id).await?.is_some()
            }
            _ => false,
        };
        summaries.push(ClubSummary {
            member_count: counts.get(&club.id).copied().unwrap_or(0),
            viewer_role,
            viewer_request_pending,
            club,
        });
    }
    Ok(summaries)
}

// --- Club CRUD ---

#[utoipa::path(
    get,
    path = "/clubs",
    params(ClubFilter),
    responses((status = 200, description = "Club summaries", body = [ClubSummary]))
)]
pub async fn list_clubs(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ClubFilter>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let clubs = state.repo.list_clubs(&filter).await?;
    let summaries = summarize(state.repo.as_ref(), clubs, viewer.as_ref()).await?;
    Ok(Json(summaries))
}

/// get_club
///
/// Metadata is readable for private clubs too; only their content is gated.
#[utoipa::path(
    get,
    path = "/clubs/{id}",
    params(("id" = Uuid, Path, description = "Club ID")),
    responses(
        (status = 200, description = "Club detail", body = ClubDetail),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_club(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClubDetail>> {
    let access = ClubAccess::load(state.repo.as_ref(), id, viewer.as_ref()).await?;
    let permissions = access.permissions();
    let summary = summarize(state.repo.as_ref(), vec![access.club], viewer.as_ref())
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("club summary missing".to_string()))?;
    Ok(Json(ClubDetail {
        summary,
        permissions,
    }))
}

#[utoipa::path(
    get,
    path = "/me/clubs",
    responses((status = 200, description = "Clubs the caller belongs to", body = [ClubSummary]))
)]
pub async fn my_clubs(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let clubs = state.repo.list_clubs_for_user(&user.id).await?;
    let summaries = summarize(state.repo.as_ref(), clubs, Some(&user)).await?;
    Ok(Json(summaries))
}

/// create_club
///
/// The slug is derived from the name; a clash on the slug's unique index is a
/// `CONFLICT`. The creator is inserted as the club's first ADMIN in the same call.
#[utoipa::path(
    post,
    path = "/clubs",
    request_body = CreateClubRequest,
    responses(
        (status = 201, description = "Created", body = Club),
        (status = 409, description = "Name taken", body = crate::error::ErrorBody)
    )
)]
pub async fn create_club(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateClubRequest>,
) -> AppResult<(StatusCode, Json<Club>)> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    payload.validate()?;

    let now = Utc::now();
    let club = Club {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        slug: slugify(&payload.name),
        description: payload.description.trim().to_string(),
        visibility: payload.visibility,
        location: payload.location,
        image_url: payload.image_url,
        created_by: user.id.clone(),
        created_at: now,
        updated_at: now,
    };
    let club = state.repo.create_club(&club).await?;

    state
        .audit
        .record(
            AuditEvent::club(club.id, &user.id, AuditAction::ClubCreated, "club", club.id)
                .with_metadata(json!({ "name": club.name, "visibility": club.visibility })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(club)))
}

#[utoipa::path(
    patch,
    path = "/clubs/{id}",
    params(("id" = Uuid, Path, description = "Club ID")),
    request_body = UpdateClubRequest,
    responses((status = 200, description = "Updated", body = Club))
)]
pub async fn update_club(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClubRequest>,
) -> AppResult<Json<Club>> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::ClubEdit)?;
    payload.validate()?;

    let club = state
        .repo
        .update_club(id, &payload)
        .await?
        .ok_or_else(|| AppError::not_found("club"))?;

    state
        .audit
        .record(
            AuditEvent::club(id, &user.id, AuditAction::ClubUpdated, "club", id)
                .with_metadata(serde_json::to_value(&payload).unwrap_or_default()),
        )
        .await;

    Ok(Json(club))
}

/// delete_club
///
/// Only the creator or a site admin. Cascades to memberships, posts, events and
/// challenges; the audit trail survives.
#[utoipa::path(
    delete,
    path = "/clubs/{id}",
    params(("id" = Uuid, Path, description = "Club ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the creator", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_club(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    if !(access.is_creator() || user.site_role.is_site_admin()) {
        return Err(AppError::forbidden("only the club creator can delete the club"));
    }

    if !state.repo.delete_club(id).await? {
        return Err(AppError::not_found("club"));
    }

    state
        .audit
        .record(
            AuditEvent::club(id, &user.id, AuditAction::ClubDeleted, "club", id)
                .with_metadata(json!({ "name": access.club.name })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// --- Membership ---

/// join_club
///
/// Public clubs admit immediately; private clubs get a pending join request.
#[utoipa::path(
    post,
    path = "/clubs/{id}/join",
    params(("id" = Uuid, Path, description = "Club ID")),
    request_body = JoinClubRequest,
    responses(
        (status = 200, description = "Joined or requested", body = JoinClubResponse),
        (status = 403, description = "Banned", body = crate::error::ErrorBody),
        (status = 409, description = "Already a member or already requested", body = crate::error::ErrorBody)
    )
)]
pub async fn join_club(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<JoinClubRequest>>,
) -> AppResult<Json<JoinClubResponse>> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;

    if state.repo.get_ban(id, &user.id).await?.is_some() {
        return Err(AppError::forbidden("you are banned from this club"));
    }
    if access.is_member() {
        return Err(AppError::conflict("already a member of this club"));
    }

    let now = Utc::now();
    match access.club.visibility {
        ClubVisibility::Public => {
            let member = ClubMember {
                club_id: id,
                user_id: user.id.clone(),
                role: ClubRole::Member,
                joined_at: now,
            };
            let member = state.repo.insert_member(&member).await?;
            state
                .audit
                .record(AuditEvent::club(id, &user.id, AuditAction::MemberJoined, "user", &user.id))
                .await;
            Ok(Json(JoinClubResponse {
                outcome: JoinOutcome::Joined,
                membership: Some(member),
                request: None,
            }))
        }
        ClubVisibility::Private => {
            if state.repo.find_pending_request(id, &user.id).await?.is_some() {
                return Err(AppError::conflict("a join request is already pending"));
            }
            let message = payload
                .and_then(|Json(body)| body.message)
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty());
            if message.as_ref().is_some_and(|m| m.chars().count() > 500) {
                return Err(AppError::bad_request("message must be at most 500 characters"));
            }

            let request = ClubJoinRequest {
                id: Uuid::new_v4(),
                club_id: id,
                user_id: user.id.clone(),
                message,
                status: JoinRequestStatus::Pending,
                created_at: now,
                reviewed_by: None,
                reviewed_at: None,
            };
            let request = state.repo.insert_join_request(&request).await?;
            tracing::info!(club_id = %id, user_id = %user.id, "join request submitted");
            Ok(Json(JoinClubResponse {
                outcome: JoinOutcome::Requested,
                membership: None,
                request: Some(request),
            }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/clubs/{id}/leave",
    params(("id" = Uuid, Path, description = "Club ID")),
    responses(
        (status = 204, description = "Left"),
        (status = 400, description = "Creator cannot leave", body = crate::error::ErrorBody),
        (status = 404, description = "Not a member", body = crate::error::ErrorBody)
    )
)]
pub async fn leave_club(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    if access.is_creator() {
        return Err(AppError::bad_request("the club creator cannot leave the club"));
    }
    if !state.repo.delete_member(id, &user.id).await? {
        return Err(AppError::not_found("membership"));
    }

    state
        .audit
        .record(AuditEvent::club(id, &user.id, AuditAction::MemberLeft, "user", &user.id))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/clubs/{id}/members",
    params(("id" = Uuid, Path, description = "Club ID")),
    responses((status = 200, description = "Members, highest role first", body = [MemberView]))
)]
pub async fn list_members(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<MemberView>>> {
    let access = ClubAccess::load(state.repo.as_ref(), id, viewer.as_ref()).await?;
    access.require_view_content()?;
    Ok(Json(state.repo.list_members(id).await?))
}

/// update_member_role
///
/// Needs `member:manage_roles` and strict seniority over the target. The creator's
/// role is fixed and nobody changes their own role.
#[utoipa::path(
    patch,
    path = "/clubs/{id}/members/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("user_id" = String, Path, description = "Target user ID")
    ),
    request_body = UpdateMemberRoleRequest,
    responses((status = 200, description = "Updated membership", body = ClubMember))
)]
pub async fn update_member_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, target_id)): Path<(Uuid, String)>,
    Json(payload): Json<UpdateMemberRoleRequest>,
) -> AppResult<Json<ClubMember>> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::MemberManageRoles)?;

    if target_id == user.id {
        return Err(AppError::bad_request("you cannot change your own role"));
    }
    let target = state
        .repo
        .get_member(id, &target_id)
        .await?
        .ok_or_else(|| AppError::not_found("member"))?;
    if target.user_id == access.club.created_by {
        return Err(AppError::forbidden("the club creator's role cannot be changed"));
    }
    if !access.can_act_on(&target) {
        return Err(AppError::forbidden("you do not outrank this member"));
    }

    let updated = state
        .repo
        .update_member_role(id, &target_id, payload.role)
        .await?
        .ok_or_else(|| AppError::not_found("member"))?;

    state
        .audit
        .record(
            AuditEvent::club(id, &user.id, AuditAction::MemberRoleChanged, "user", &target_id)
                .with_metadata(json!({ "from": target.role, "to": updated.role })),
        )
        .await;

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/clubs/{id}/members/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("user_id" = String, Path, description = "Target user ID")
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 403, description = "Insufficient rank", body = crate::error::ErrorBody)
    )
)]
pub async fn remove_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, target_id)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::MemberRemove)?;

    if target_id == user.id {
        return Err(AppError::bad_request("use leave to remove yourself"));
    }
    let target = state
        .repo
        .get_member(id, &target_id)
        .await?
        .ok_or_else(|| AppError::not_found("member"))?;
    if target.user_id == access.club.created_by {
        return Err(AppError::forbidden("the club creator cannot be removed"));
    }
    if !access.can_act_on(&target) {
        return Err(AppError::forbidden("you do not outrank this member"));
    }

    state.repo.delete_member(id, &target_id).await?;
    state
        .audit
        .record(
            AuditEvent::club(id, &user.id, AuditAction::MemberRemoved, "user", &target_id)
                .with_metadata(json!({ "role": target.role })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// --- Join requests ---

#[utoipa::path(
    get,
    path = "/clubs/{id}/join-requests",
    params(("id" = Uuid, Path, description = "Club ID"), JoinRequestFilter),
    responses((status = 200, description = "Join requests, oldest first", body = [ClubJoinRequest]))
)]
pub async fn list_join_requests(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<JoinRequestFilter>,
) -> AppResult<Json<Vec<ClubJoinRequest>>> {
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::JoinRequestReview)?;
    let status = filter.status.unwrap_or(JoinRequestStatus::Pending);
    Ok(Json(state.repo.list_join_requests(id, status).await?))
}

#[utoipa::path(
    delete,
    path = "/clubs/{id}/join-requests/mine",
    params(("id" = Uuid, Path, description = "Club ID")),
    responses(
        (status = 204, description = "Cancelled"),
        (status = 404, description = "No pending request", body = crate::error::ErrorBody)
    )
)]
pub async fn cancel_my_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    let pending = state
        .repo
        .find_pending_request(id, &user.id)
        .await?
        .ok_or_else(|| AppError::not_found("pending join request"))?;

    state
        .repo
        .resolve_join_request(pending.id, JoinRequestStatus::Cancelled, Some(&user.id))
        .await?
        .ok_or_else(|| AppError::not_found("pending join request"))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Loads a join request and checks it belongs to `club_id` and is still pending.
async fn pending_request_in(
    repo: &dyn Repository,
    club_id: Uuid,
    request_id: Uuid,
) -> AppResult<ClubJoinRequest> {
    let request = repo
        .get_join_request(request_id)
        .await?
        .filter(|r| r.club_id == club_id)
        .ok_or_else(|| AppError::not_found("join request"))?;
    if request.status != JoinRequestStatus::Pending {
        return Err(AppError::bad_request(format!(
            "join request is already {}",
            request.status
        )));
    }
    Ok(request)
}

#[utoipa::path(
    post,
    path = "/clubs/{id}/join-requests/{request_id}/approve",
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("request_id" = Uuid, Path, description = "Join request ID")
    ),
    responses((status = 200, description = "New membership", body = ClubMember))
)]
pub async fn approve_join_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, request_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ClubMember>> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::JoinRequestReview)?;
    let request = pending_request_in(state.repo.as_ref(), id, request_id).await?;

    let member = state.repo.approve_join_request(request.id, &user.id).await?;

    state
        .audit
        .record(
            AuditEvent::club(id, &user.id, AuditAction::JoinRequestApproved, "join_request", request.id)
                .with_metadata(json!({ "user_id": request.user_id })),
        )
        .await;

    Ok(Json(member))
}

#[utoipa::path(
    post,
    path = "/clubs/{id}/join-requests/{request_id}/reject",
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("request_id" = Uuid, Path, description = "Join request ID")
    ),
    responses((status = 200, description = "Rejected request", body = ClubJoinRequest))
)]
pub async fn reject_join_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, request_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ClubJoinRequest>> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::JoinRequestReview)?;
    let request = pending_request_in(state.repo.as_ref(), id, request_id).await?;

    let rejected = state
        .repo
        .resolve_join_request(request.id, JoinRequestStatus::Rejected, Some(&user.id))
        .await?
        .ok_or_else(|| AppError::bad_request("join request is no longer pending"))?;

    state
        .audit
        .record(
            AuditEvent::club(id, &user.id, AuditAction::JoinRequestRejected, "join_request", request.id)
                .with_metadata(json!({ "user_id": request.user_id })),
        )
        .await;

    Ok(Json(rejected))
}

// --- Bans ---

#[utoipa::path(
    get,
    path = "/clubs/{id}/bans",
    params(("id" = Uuid, Path, description = "Club ID")),
    responses((status = 200, description = "Active bans", body = [ClubBan]))
)]
pub async fn list_bans(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ClubBan>>> {
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::MemberBan)?;
    Ok(Json(state.repo.list_bans(id).await?))
}

/// ban_member
///
/// Bans a member or an outsider. A current member must be outranked; the creator is
/// never bannable. The ban removes the membership and cancels any pending request.
#[utoipa::path(
    post,
    path = "/clubs/{id}/bans",
    params(("id" = Uuid, Path, description = "Club ID")),
    request_body = BanMemberRequest,
    responses(
        (status = 201, description = "Banned", body = ClubBan),
        (status = 409, description = "Already banned", body = crate::error::ErrorBody)
    )
)]
pub async fn ban_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BanMemberRequest>,
) -> AppResult<(StatusCode, Json<ClubBan>)> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::MemberBan)?;

    let target_id = payload.user_id.trim().to_string();
    if target_id == user.id {
        return Err(AppError::bad_request("you cannot ban yourself"));
    }
    if target_id == access.club.created_by {
        return Err(AppError::forbidden("the club creator cannot be banned"));
    }
    if state.repo.get_user(&target_id).await?.is_none() {
        return Err(AppError::not_found("user"));
    }
    if let Some(target) = state.repo.get_member(id, &target_id).await? {
        if !access.can_act_on(&target) {
            return Err(AppError::forbidden("you do not outrank this member"));
        }
    }
    if state.repo.get_ban(id, &target_id).await?.is_some() {
        return Err(AppError::conflict("user is already banned"));
    }

    let reason = payload
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let ban = ClubBan {
        club_id: id,
        user_id: target_id.clone(),
        banned_by: user.id.clone(),
        reason,
        created_at: Utc::now(),
    };
    let ban = state.repo.ban_member(&ban).await?;

    state
        .audit
        .record(
            AuditEvent::club(id, &user.id, AuditAction::MemberBanned, "user", &target_id)
                .with_metadata(json!({ "reason": ban.reason })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(ban)))
}

#[utoipa::path(
    delete,
    path = "/clubs/{id}/bans/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("user_id" = String, Path, description = "Banned user ID")
    ),
    responses(
        (status = 204, description = "Unbanned"),
        (status = 404, description = "Not banned", body = crate::error::ErrorBody)
    )
)]
pub async fn unban_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, target_id)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::MemberBan)?;

    if !state.repo.delete_ban(id, &target_id).await? {
        return Err(AppError::not_found("ban"));
    }

    state
        .audit
        .record(AuditEvent::club(id, &user.id, AuditAction::MemberUnbanned, "user", &target_id))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/clubs/{id}/audit-log",
    params(("id" = Uuid, Path, description = "Club ID"), AuditLogQuery),
    responses((status = 200, description = "Club audit log, newest first", body = [AuditLog]))
)]
pub async fn club_audit_log(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<Json<Vec<AuditLog>>> {
    let access = ClubAccess::load(state.repo.as_ref(), id, Some(&user)).await?;
    access.require(Capability::AuditView)?;
    let entries = state
        .repo
        .list_audit_logs(Some(id), query.effective_limit())
        .await?;
    Ok(Json(entries))
}
