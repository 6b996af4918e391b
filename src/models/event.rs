use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::check_text;
use crate::error::{AppError, AppResult};

text_enum! {
    /// RSVP state. Only `GOING` counts against an event's capacity.
    pub enum AttendanceStatus {
        Going => "GOING",
        Interested => "INTERESTED",
    }
}

impl Default for AttendanceStatus {
    fn default() -> Self {
        AttendanceStatus::Going
    }
}

/// ClubEvent
///
/// A meet, cruise or track day organised by a club (`club_events` table).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ClubEvent {
    pub id: Uuid,
    pub club_id: Uuid,
    pub created_by: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
    /// Maximum number of GOING attendees. None means unlimited.
    pub capacity: Option<i32>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl ClubEvent {
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EventAttendee {
    pub event_id: Uuid,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    #[ts(type = "string")]
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EventView {
    pub event: ClubEvent,
    pub going_count: i64,
    pub interested_count: i64,
    pub viewer_status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AttendeeView {
    pub user_id: String,
    pub display_name: String,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    #[ts(type = "string")]
    pub responded_at: DateTime<Utc>,
}

// --- Request payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: Option<String>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
}

impl CreateEventRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_event_fields(
            &self.title,
            &self.description,
            self.starts_at,
            self.ends_at,
            self.capacity,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Absent keeps the current capacity; `null` removes the limit.
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "number | null")]
    #[schema(value_type = Option<i32>)]
    pub capacity: Option<Option<i32>>,
}

/// Reads a present field into `Some`, so `null` becomes `Some(None)` while a missing
/// field falls back to `None` through `#[serde(default)]`.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateEventRequest {
    /// Applies the provided fields onto `event` and validates the merged result.
    pub fn apply(self, mut event: ClubEvent) -> AppResult<ClubEvent> {
        if let Some(title) = self.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            event.description = description.trim().to_string();
        }
        if let Some(location) = self.location {
            let location = location.trim();
            event.location = (!location.is_empty()).then(|| location.to_string());
        }
        if let Some(starts_at) = self.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = self.ends_at {
            event.ends_at = ends_at;
        }
        if let Some(capacity) = self.capacity {
            event.capacity = capacity;
        }
        validate_event_fields(
            &event.title,
            &event.description,
            event.starts_at,
            event.ends_at,
            event.capacity,
        )?;
        Ok(event)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AttendEventRequest {
    #[serde(default)]
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct EventListQuery {
    /// When true (the default) only events that have not ended are returned.
    pub upcoming: Option<bool>,
}

fn validate_event_fields(
    title: &str,
    description: &str,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    capacity: Option<i32>,
) -> AppResult<()> {
    check_text("title", title, 1, 120)?;
    if description.chars().count() > 5000 {
        return Err(AppError::validation(
            "description must be at most 5000 characters",
        ));
    }
    if ends_at <= starts_at {
        return Err(AppError::validation("ends_at must be after starts_at"));
    }
    if matches!(capacity, Some(c) if c < 1) {
        return Err(AppError::validation("capacity must be at least 1"));
    }
    Ok(())
}
