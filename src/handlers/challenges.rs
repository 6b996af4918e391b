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
        AuditAction, Challenge, ChallengeParticipant, ChallengeView, CreateChallengeRequest,
        LeaderboardEntry, LeaderboardQuery, LeaderboardRow, SubmitEntryRequest, rank_entries,
    },
    permissions::{Capability, ClubAccess},
    rate_limit::EndpointClass,
    repository::Repository,
};

async fn challenge_view(
    repo: &dyn Repository,
    challenge: Challenge,
    viewer: Option<&str>,
) -> AppResult<ChallengeView> {
    let participant_count = repo.participant_count(challenge.id).await?;
    let viewer_joined = match viewer {
        Some(user_id) => repo.get_participant(challenge.id, user_id).await?.is_some(),
        None => false,
    };
    Ok(ChallengeView {
        challenge,
        participant_count,
        viewer_joined,
    })
}

async fn challenge_with_access(
    state: &AppState,
    challenge_id: Uuid,
    viewer: Option<&AuthUser>,
) -> AppResult<(Challenge, ClubAccess)> {
    let challenge = state
        .repo
        .get_challenge(challenge_id)
        .await?
        .ok_or_else(|| AppError::not_found("challenge"))?;
    let access = ClubAccess::load(state.repo.as_ref(), challenge.club_id, viewer).await?;
    Ok((challenge, access))
}

#[utoipa::path(
    get,
    path = "/clubs/{id}/challenges",
    params(("id" = Uuid, Path, description = "Club ID")),
    responses((status = 200, description = "Challenges", body = [ChallengeView]))
)]
pub async fn list_challenges(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
) -> AppResult<Json<Vec<ChallengeView>>> {
    let access = ClubAccess::load(state.repo.as_ref(), club_id, viewer.as_ref()).await?;
    access.require_view_content()?;

    let viewer_id = viewer.as_ref().map(|u| u.id.as_str());
    let challenges = state.repo.list_challenges(club_id).await?;
    let mut views = Vec::with_capacity(challenges.len());
    for challenge in challenges {
        views.push(challenge_view(state.repo.as_ref(), challenge, viewer_id).await?);
    }
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/challenges/{id}",
    params(("id" = Uuid, Path, description = "Challenge ID")),
    responses((status = 200, description = "Challenge", body = ChallengeView))
)]
pub async fn get_challenge(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ChallengeView>> {
    let (challenge, access) = challenge_with_access(&state, id, viewer.as_ref()).await?;
    access.require_view_content()?;
    let view = challenge_view(
        state.repo.as_ref(),
        challenge,
        viewer.as_ref().map(|u| u.id.as_str()),
    )
    .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/clubs/{id}/challenges",
    params(("id" = Uuid, Path, description = "Club ID")),
    request_body = CreateChallengeRequest,
    responses((status = 201, description = "Created", body = ChallengeView))
)]
pub async fn create_challenge(
    user: AuthUser,
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
    Json(payload): Json<CreateChallengeRequest>,
) -> AppResult<(StatusCode, Json<ChallengeView>)> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), club_id, Some(&user)).await?;
    access.require(Capability::ChallengeCreate)?;
    payload.validate()?;

    let challenge = Challenge {
        id: Uuid::new_v4(),
        club_id,
        created_by: user.id.clone(),
        title: payload.title.trim().to_string(),
        description: payload.description.trim().to_string(),
        metric: payload.metric.trim().to_string(),
        unit: payload.unit.trim().to_string(),
        ranking: payload.ranking,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        created_at: Utc::now(),
    };
    let challenge = state.repo.insert_challenge(&challenge).await?;

    state
        .audit
        .record(
            AuditEvent::club(
                club_id,
                &user.id,
                AuditAction::ChallengeCreated,
                "challenge",
                challenge.id,
            )
            .with_metadata(serde_json::json!({
                "title": challenge.title,
                "metric": challenge.metric,
                "ranking": challenge.ranking,
            })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ChallengeView {
            challenge,
            ..Default::default()
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/challenges/{id}",
    params(("id" = Uuid, Path, description = "Challenge ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_challenge(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (challenge, access) = challenge_with_access(&state, id, Some(&user)).await?;
    if challenge.created_by != user.id {
        access.require(Capability::ChallengeManage)?;
    }

    if !state.repo.delete_challenge(id).await? {
        return Err(AppError::not_found("challenge"));
    }

    state
        .audit
        .record(
            AuditEvent::club(
                challenge.club_id,
                &user.id,
                AuditAction::ChallengeDeleted,
                "challenge",
                id,
            )
            .with_metadata(serde_json::json!({ "title": challenge.title })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// --- Participation ---

#[utoipa::path(
    post,
    path = "/challenges/{id}/join",
    params(("id" = Uuid, Path, description = "Challenge ID")),
    responses(
        (status = 201, description = "Joined", body = ChallengeParticipant),
        (status = 400, description = "Challenge has ended", body = crate::error::ErrorBody),
        (status = 409, description = "Already joined", body = crate::error::ErrorBody)
    )
)]
pub async fn join_challenge(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ChallengeParticipant>)> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let (challenge, access) = challenge_with_access(&state, id, Some(&user)).await?;
    access.require(Capability::ChallengeParticipate)?;

    let now = Utc::now();
    if challenge.has_ended(now) {
        return Err(AppError::bad_request("challenge has already ended"));
    }
    if state.repo.get_participant(id, &user.id).await?.is_some() {
        return Err(AppError::conflict("already participating in this challenge"));
    }

    let participant = ChallengeParticipant {
        challenge_id: id,
        user_id: user.id.clone(),
        joined_at: now,
    };
    let participant = state.repo.insert_participant(&participant).await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

/// leave_challenge
///
/// Entries already submitted stay on the leaderboard.
#[utoipa::path(
    post,
    path = "/challenges/{id}/leave",
    params(("id" = Uuid, Path, description = "Challenge ID")),
    responses(
        (status = 204, description = "Left"),
        (status = 404, description = "Not a participant", body = crate::error::ErrorBody)
    )
)]
pub async fn leave_challenge(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    challenge_with_access(&state, id, Some(&user)).await?;
    if !state.repo.delete_participant(id, &user.id).await? {
        return Err(AppError::not_found("participation"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/challenges/{id}/entries",
    params(("id" = Uuid, Path, description = "Challenge ID")),
    request_body = SubmitEntryRequest,
    responses(
        (status = 201, description = "Entry recorded", body = LeaderboardEntry),
        (status = 400, description = "Outside the challenge window", body = crate::error::ErrorBody),
        (status = 403, description = "Not a participant", body = crate::error::ErrorBody)
    )
)]
pub async fn submit_entry(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitEntryRequest>,
) -> AppResult<(StatusCode, Json<LeaderboardEntry>)> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let (challenge, access) = challenge_with_access(&state, id, Some(&user)).await?;
    access.require(Capability::ChallengeParticipate)?;

    if state.repo.get_participant(id, &user.id).await?.is_none() {
        return Err(AppError::forbidden(
            "join the challenge before submitting entries",
        ));
    }
    let now = Utc::now();
    if !challenge.is_open(now) {
        return Err(AppError::bad_request("challenge is not accepting entries"));
    }
    payload.validate()?;

    let entry = LeaderboardEntry {
        id: Uuid::new_v4(),
        challenge_id: id,
        user_id: user.id.clone(),
        value: payload.value,
        proof_url: payload.proof_url,
        submitted_at: now,
    };
    let entry = state.repo.insert_entry(&entry).await?;
    tracing::debug!(challenge_id = %id, user_id = %user.id, value = entry.value, "entry submitted");

    Ok((StatusCode::CREATED, Json(entry)))
}

/// leaderboard
///
/// Best entry per participant, ranked according to the challenge's direction.
#[utoipa::path(
    get,
    path = "/challenges/{id}/leaderboard",
    params(("id" = Uuid, Path, description = "Challenge ID"), LeaderboardQuery),
    responses((status = 200, description = "Ranked rows", body = [LeaderboardRow]))
)]
pub async fn leaderboard(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult<Json<Vec<LeaderboardRow>>> {
    let (challenge, access) = challenge_with_access(&state, id, viewer.as_ref()).await?;
    access.require_view_content()?;

    let entries = state.repo.list_entries(id).await?;
    let mut user_ids: Vec<String> = entries.iter().map(|e| e.user_id.clone()).collect();
    user_ids.sort();
    user_ids.dedup();
    let names = state.repo.display_names(&user_ids).await?;

    Ok(Json(rank_entries(
        &entries,
        challenge.ranking,
        &names,
        query.effective_limit(),
    )))
}
