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
        AttendEventRequest, AttendeeView, AuditAction, ClubEvent, CreateEventRequest,
        EventAttendee, EventListQuery, EventView, UpdateEventRequest,
    },
    permissions::{Capability, ClubAccess},
    rate_limit::EndpointClass,
    repository::Repository,
};

async fn event_view(
    repo: &dyn Repository,
    event: ClubEvent,
    viewer: Option<&str>,
) -> AppResult<EventView> {
    let counts = repo.attendance_counts(event.id).await?;
    let viewer_status = match viewer {
        Some(user_id) => repo.get_attendee(event.id, user_id).await?.map(|a| a.status),
        None => None,
    };
    Ok(EventView {
        event,
        going_count: counts.going,
        interested_count: counts.interested,
        viewer_status,
    })
}

async fn event_with_access(
    state: &AppState,
    event_id: Uuid,
    viewer: Option<&AuthUser>,
) -> AppResult<(ClubEvent, ClubAccess)> {
    let event = state
        .repo
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::not_found("event"))?;
    let access = ClubAccess::load(state.repo.as_ref(), event.club_id, viewer).await?;
    Ok((event, access))
}

/// Creator of the event, or anyone holding `event:manage` in its club.
fn require_event_manager(event: &ClubEvent, user: &AuthUser, access: &ClubAccess) -> AppResult<()> {
    if event.created_by == user.id {
        return Ok(());
    }
    access.require(Capability::EventManage)
}

/// list_events
///
/// Ordered by start time. `upcoming` defaults to true and hides events that have
/// already ended.
#[utoipa::path(
    get,
    path = "/clubs/{id}/events",
    params(("id" = Uuid, Path, description = "Club ID"), EventListQuery),
    responses((status = 200, description = "Events", body = [EventView]))
)]
pub async fn list_events(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
    Query(query): Query<EventListQuery>,
) -> AppResult<Json<Vec<EventView>>> {
    let access = ClubAccess::load(state.repo.as_ref(), club_id, viewer.as_ref()).await?;
    access.require_view_content()?;

    let ends_after = query.upcoming.unwrap_or(true).then(Utc::now);
    let events = state.repo.list_events(club_id, ends_after).await?;

    let viewer_id = viewer.as_ref().map(|u| u.id.as_str());
    let mut views = Vec::with_capacity(events.len());
    for event in events {
        views.push(event_view(state.repo.as_ref(), event, viewer_id).await?);
    }
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses((status = 200, description = "Event", body = EventView))
)]
pub async fn get_event(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EventView>> {
    let (event, access) = event_with_access(&state, id, viewer.as_ref()).await?;
    access.require_view_content()?;
    let view = event_view(
        state.repo.as_ref(),
        event,
        viewer.as_ref().map(|u| u.id.as_str()),
    )
    .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/clubs/{id}/events",
    params(("id" = Uuid, Path, description = "Club ID")),
    request_body = CreateEventRequest,
    responses((status = 201, description = "Created", body = EventView))
)]
pub async fn create_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
    Json(payload): Json<CreateEventRequest>,
) -> AppResult<(StatusCode, Json<EventView>)> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let access = ClubAccess::load(state.repo.as_ref(), club_id, Some(&user)).await?;
    access.require(Capability::EventCreate)?;
    payload.validate()?;

    let now = Utc::now();
    let event = ClubEvent {
        id: Uuid::new_v4(),
        club_id,
        created_by: user.id.clone(),
        title: payload.title.trim().to_string(),
        description: payload.description.trim().to_string(),
        location: payload.location,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        capacity: payload.capacity,
        created_at: now,
        updated_at: now,
    };
    let event = state.repo.insert_event(&event).await?;

    state
        .audit
        .record(
            AuditEvent::club(club_id, &user.id, AuditAction::EventCreated, "event", event.id)
                .with_metadata(serde_json::json!({
                    "title": event.title,
                    "starts_at": event.starts_at,
                })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(EventView {
            event,
            ..Default::default()
        }),
    ))
}

/// update_event
///
/// Fields are merged onto the stored event and the result is validated as a whole,
/// so moving only `starts_at` past the existing `ends_at` is rejected.
#[utoipa::path(
    patch,
    path = "/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses((status = 200, description = "Updated", body = EventView))
)]
pub async fn update_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEventRequest>,
) -> AppResult<Json<EventView>> {
    throttle(&state, &user, EndpointClass::ClubWrite)?;
    let (event, access) = event_with_access(&state, id, Some(&user)).await?;
    require_event_manager(&event, &user, &access)?;

    let merged = payload.apply(event)?;
    let updated = state
        .repo
        .update_event(&merged)
        .await?
        .ok_or_else(|| AppError::not_found("event"))?;

    let view = event_view(state.repo.as_ref(), updated, Some(&user.id)).await?;
    Ok(Json(view))
}

#[utoipa::path(
    delete,
    path = "/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (event, access) = event_with_access(&state, id, Some(&user)).await?;
    require_event_manager(&event, &user, &access)?;

    if !state.repo.delete_event(id).await? {
        return Err(AppError::not_found("event"));
    }

    state
        .audit
        .record(
            AuditEvent::club(event.club_id, &user.id, AuditAction::EventDeleted, "event", id)
                .with_metadata(serde_json::json!({ "title": event.title })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// --- Attendance ---

/// attend_event
///
/// Upserts the caller's RSVP. Moving to GOING is refused with `CONFLICT` once the
/// event is at capacity; INTERESTED is never capped.
#[utoipa::path(
    put,
    path = "/events/{id}/attendance",
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = AttendEventRequest,
    responses(
        (status = 200, description = "RSVP recorded", body = EventView),
        (status = 400, description = "Event has ended", body = crate::error::ErrorBody),
        (status = 409, description = "Event is full", body = crate::error::ErrorBody)
    )
)]
pub async fn attend_event(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AttendEventRequest>,
) -> AppResult<Json<EventView>> {
    throttle(&state, &user, EndpointClass::Reaction)?;
    let (event, access) = event_with_access(&state, id, Some(&user)).await?;
    access.require(Capability::EventAttend)?;

    let now = Utc::now();
    if event.has_ended(now) {
        return Err(AppError::bad_request("event has already ended"));
    }

    let attendee = EventAttendee {
        event_id: id,
        user_id: user.id.clone(),
        status: payload.status,
        responded_at: now,
    };
    // Capacity is enforced by the store, atomically with the write.
    state.repo.upsert_attendee(&attendee).await?;

    let view = event_view(state.repo.as_ref(), event, Some(&user.id)).await?;
    Ok(Json(view))
}

#[utoipa::path(
    delete,
    path = "/events/{id}/attendance",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "RSVP withdrawn"),
        (status = 404, description = "Not attending", body = crate::error::ErrorBody)
    )
)]
pub async fn cancel_attendance(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    event_with_access(&state, id, Some(&user)).await?;
    if !state.repo.delete_attendee(id, &user.id).await? {
        return Err(AppError::not_found("attendance"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/events/{id}/attendees",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses((status = 200, description = "Attendees", body = [AttendeeView]))
)]
pub async fn list_attendees(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<AttendeeView>>> {
    let (_, access) = event_with_access(&state, id, viewer.as_ref()).await?;
    access.require_view_content()?;
    Ok(Json(state.repo.list_attendees(id).await?))
}
