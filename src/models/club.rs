use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::check_text;
use crate::error::{AppError, AppResult};

text_enum! {
    /// Public clubs are open to join and readable by anyone; private clubs take join
    /// requests and hide their content from non-members.
    pub enum ClubVisibility {
        Public => "PUBLIC",
        Private => "PRIVATE",
    }
}

impl Default for ClubVisibility {
    fn default() -> Self {
        ClubVisibility::Public
    }
}

text_enum! {
    /// Membership role, scoped to one club.
    pub enum ClubRole {
        Admin => "ADMIN",
        Moderator => "MODERATOR",
        Member => "MEMBER",
    }
}

impl ClubRole {
    /// Higher is more privileged.
    pub fn rank(&self) -> u8 {
        match self {
            ClubRole::Admin => 3,
            ClubRole::Moderator => 2,
            ClubRole::Member => 1,
        }
    }
}

impl Default for ClubRole {
    fn default() -> Self {
        ClubRole::Member
    }
}

text_enum! {
    pub enum JoinRequestStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Cancelled => "CANCELLED",
    }
}

impl Default for JoinRequestStatus {
    fn default() -> Self {
        JoinRequestStatus::Pending
    }
}

/// Club
///
/// A community group (`clubs` table). `slug` is derived from the name and unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub visibility: ClubVisibility,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub created_by: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// ClubMember
///
/// One row per (club, user); the composite primary key enforces uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ClubMember {
    pub club_id: Uuid,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub role: ClubRole,
    #[ts(type = "string")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ClubJoinRequest {
    pub id: Uuid,
    pub club_id: Uuid,
    pub user_id: String,
    pub message: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: JoinRequestStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    #[ts(type = "string | null")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ClubBan {
    pub club_id: Uuid,
    pub user_id: String,
    pub banned_by: String,
    pub reason: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ClubSummary
///
/// Listing/detail view: the club plus its member count and, for signed-in callers,
/// their own role (null when not a member).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ClubSummary {
    pub club: Club,
    pub member_count: i64,
    pub viewer_role: Option<ClubRole>,
    /// True while the caller has a pending join request for this club.
    pub viewer_request_pending: bool,
}

/// MemberView
///
/// A membership row joined with the member's display name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MemberView {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: ClubRole,
    #[ts(type = "string")]
    pub joined_at: DateTime<Utc>,
}

// --- Request payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateClubRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: ClubVisibility,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

impl CreateClubRequest {
    pub fn validate(&self) -> AppResult<()> {
        check_text("name", &self.name, 3, 80)?;
        if self.description.chars().count() > 2000 {
            return Err(AppError::validation(
                "description must be at most 2000 characters",
            ));
        }
        if slugify(&self.name).is_empty() {
            return Err(AppError::validation(
                "name must contain at least one letter or digit",
            ));
        }
        Ok(())
    }
}

/// UpdateClubRequest
///
/// Partial update (PATCH /clubs/{id}); only provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateClubRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<ClubVisibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl UpdateClubRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(description) = &self.description {
            if description.chars().count() > 2000 {
                return Err(AppError::validation(
                    "description must be at most 2000 characters",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct JoinClubRequest {
    /// Optional note to the club's moderators (private clubs only).
    pub message: Option<String>,
}

text_enum! {
    pub enum JoinOutcome {
        Joined => "JOINED",
        Requested => "REQUESTED",
    }
}

/// JoinClubResponse
///
/// Public clubs answer `JOINED` with the new membership; private clubs answer
/// `REQUESTED` with the pending join request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct JoinClubResponse {
    pub outcome: JoinOutcome,
    pub membership: Option<ClubMember>,
    pub request: Option<ClubJoinRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateMemberRoleRequest {
    pub role: ClubRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BanMemberRequest {
    pub user_id: String,
    pub reason: Option<String>,
}

/// ClubFilter
///
/// Query parameters for GET /clubs.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct ClubFilter {
    /// Case-insensitive match against name and description.
    pub search: Option<String>,
    pub visibility: Option<ClubVisibility>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct JoinRequestFilter {
    /// Defaults to PENDING.
    pub status: Option<JoinRequestStatus>,
}

/// Lowercase ASCII slug: runs of non-alphanumerics collapse to a single '-'.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
