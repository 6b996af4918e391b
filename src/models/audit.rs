use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

text_enum! {
    pub enum AuditAction {
        ClubCreated => "CLUB_CREATED",
        ClubUpdated => "CLUB_UPDATED",
        ClubDeleted => "CLUB_DELETED",
        MemberJoined => "MEMBER_JOINED",
        MemberLeft => "MEMBER_LEFT",
        MemberRemoved => "MEMBER_REMOVED",
        MemberRoleChanged => "MEMBER_ROLE_CHANGED",
        MemberBanned => "MEMBER_BANNED",
        MemberUnbanned => "MEMBER_UNBANNED",
        JoinRequestApproved => "JOIN_REQUEST_APPROVED",
        JoinRequestRejected => "JOIN_REQUEST_REJECTED",
        PostDeleted => "POST_DELETED",
        PostPinned => "POST_PINNED",
        PostUnpinned => "POST_UNPINNED",
        CommentDeleted => "COMMENT_DELETED",
        EventCreated => "EVENT_CREATED",
        EventDeleted => "EVENT_DELETED",
        ChallengeCreated => "CHALLENGE_CREATED",
        ChallengeDeleted => "CHALLENGE_DELETED",
        SiteRoleChanged => "SITE_ROLE_CHANGED",
    }
}

impl Default for AuditAction {
    fn default() -> Self {
        AuditAction::ClubUpdated
    }
}

/// AuditLog
///
/// One moderation or administrative action (`audit_logs` table). `club_id` is null
/// for site-level actions such as role changes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AuditLog {
    pub id: Uuid,
    pub club_id: Option<Uuid>,
    pub actor_id: String,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    /// Kind of entity acted on: "club", "member", "post", ...
    pub target_type: String,
    pub target_id: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct AuditLogQuery {
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}
