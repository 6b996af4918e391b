use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::check_text;
use crate::error::AppResult;

/// ClubPost
///
/// A post in a club feed (`club_posts` table). Pinned posts sort ahead of the rest.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ClubPost {
    pub id: Uuid,
    pub club_id: Uuid,
    pub author_id: String,
    pub content: String,
    pub media_url: Option<String>,
    pub is_pinned: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PostComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: String,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PostView
///
/// Feed item: the post plus the counters and the viewer flag the client patches
/// optimistically when the viewer likes or comments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PostView {
    #[sqlx(flatten)]
    pub post: ClubPost,
    pub author_name: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CommentView {
    #[sqlx(flatten)]
    pub comment: PostComment,
    pub author_name: String,
    pub like_count: i64,
    pub liked_by_viewer: bool,
}

/// LikeResponse
///
/// Authoritative like state after a like/unlike, used by the client to reconcile
/// its optimistic cache entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq, Eq)]
#[ts(export)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

// --- Request payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub content: String,
    /// Storage key or URL returned by the upload flow.
    pub media_url: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> AppResult<()> {
        check_text("content", &self.content, 1, 5000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> AppResult<()> {
        match &self.content {
            Some(content) => check_text("content", content, 1, 5000),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> AppResult<()> {
        check_text("content", &self.content, 1, 2000)
    }
}

/// PostListQuery
///
/// Cursor pagination for club feeds. The first page holds every pinned post followed
/// by up to `limit` unpinned posts, newest first. Pass the `created_at` and `id` of
/// the last post shown as `before` and `before_id` to fetch the next page of unpinned
/// posts. `before_id` breaks ties between posts created in the same instant.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct PostListQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
}

impl PostListQuery {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn cursor(&self) -> Option<FeedCursor> {
        self.before.map(|created_at| FeedCursor {
            created_at,
            id: self.before_id,
        })
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

/// Keyset position in a feed ordered by `(created_at, id)` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub id: Option<Uuid>,
}

impl FeedCursor {
    /// True when a post at `(created_at, id)` comes after this position.
    pub fn is_after(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        match self.id {
            Some(cursor_id) => (created_at, id) < (self.created_at, cursor_id),
            None => created_at < self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_breaks_ties_on_id() {
        let at = Utc::now();
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let cursor = FeedCursor {
            created_at: at,
            id: Some(high),
        };

        assert!(cursor.is_after(at, low));
        assert!(!cursor.is_after(at, high));
        assert!(!cursor.is_after(at + chrono::Duration::seconds(1), low));
        assert!(cursor.is_after(at - chrono::Duration::seconds(1), high));
    }

    #[test]
    fn cursor_without_id_is_strictly_older() {
        let at = Utc::now();
        let query = PostListQuery {
            before: Some(at),
            ..Default::default()
        };
        let cursor = query.cursor().unwrap();

        assert_eq!(cursor.id, None);
        assert!(!cursor.is_after(at, Uuid::from_u128(0)));
        assert!(cursor.is_after(at - chrono::Duration::milliseconds(1), Uuid::from_u128(9)));
    }
}
