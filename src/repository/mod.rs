use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        AttendeeView, AuditLog, Challenge, ChallengeParticipant, Club, ClubBan, ClubEvent,
        ClubFilter, ClubJoinRequest, ClubMember, ClubPost, ClubRole, CommentView, EventAttendee,
        FeedCursor, JoinRequestStatus, LeaderboardEntry, MemberView, PostComment, PostView,
        SiteRole, SiteStats, UpdateClubRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// GOING / INTERESTED head-counts for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceCounts {
    pub going: i64,
    pub interested: i64,
}

/// Repository Trait
///
/// Row-level persistence contract. Business rules (who may do what, which state
/// transitions are legal) live in the handlers; implementations only guarantee the
/// storage-level invariants:
///
/// - uniqueness of memberships, likes, bans, attendees, participants, club slugs and
///   pending join requests, reported as `AppError::Conflict`
/// - the multi-row operations (`create_club`, `approve_join_request`, `ban_member`)
///   are atomic
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: &str) -> AppResult<Option<User>>;
    /// Inserts the user unless the id already exists; returns the stored row either way.
    async fn ensure_user(&self, user: &User) -> AppResult<User>;
    async fn update_profile(&self, id: &str, req: &UpdateProfileRequest) -> AppResult<Option<User>>;
    async fn set_site_role(&self, id: &str, role: SiteRole) -> AppResult<Option<User>>;
    /// Display names for the given ids; unknown ids are omitted.
    async fn display_names(&self, ids: &[String]) -> AppResult<HashMap<String, String>>;
    async fn get_stats(&self) -> AppResult<SiteStats>;

    // --- Clubs ---
    /// Inserts the club and its creator as an ADMIN member in one step.
    async fn create_club(&self, club: &Club) -> AppResult<Club>;
    async fn get_club(&self, id: Uuid) -> AppResult<Option<Club>>;
    async fn list_clubs(&self, filter: &ClubFilter) -> AppResult<Vec<Club>>;
    async fn list_clubs_for_user(&self, user_id: &str) -> AppResult<Vec<Club>>;
    async fn update_club(&self, id: Uuid, req: &UpdateClubRequest) -> AppResult<Option<Club>>;
    async fn delete_club(&self, id: Uuid) -> AppResult<bool>;
    async fn member_counts(&self, club_ids: &[Uuid]) -> AppResult<HashMap<Uuid, i64>>;

    // --- Memberships ---
    async fn insert_member(&self, member: &ClubMember) -> AppResult<ClubMember>;
    async fn get_member(&self, club_id: Uuid, user_id: &str) -> AppResult<Option<ClubMember>>;
    async fn list_members(&self, club_id: Uuid) -> AppResult<Vec<MemberView>>;
    async fn list_memberships(&self, user_id: &str) -> AppResult<Vec<ClubMember>>;
    async fn update_member_role(
        &self,
        club_id: Uuid,
        user_id: &str,
        role: ClubRole,
    ) -> AppResult<Option<ClubMember>>;
    async fn delete_member(&self, club_id: Uuid, user_id: &str) -> AppResult<bool>;

    // --- Join requests ---
    async fn insert_join_request(&self, request: &ClubJoinRequest) -> AppResult<ClubJoinRequest>;
    async fn get_join_request(&self, id: Uuid) -> AppResult<Option<ClubJoinRequest>>;
    async fn find_pending_request(
        &self,
        club_id: Uuid,
        user_id: &str,
    ) -> AppResult<Option<ClubJoinRequest>>;
    async fn list_join_requests(
        &self,
        club_id: Uuid,
        status: JoinRequestStatus,
    ) -> AppResult<Vec<ClubJoinRequest>>;
    /// Moves a PENDING request to `status`. Returns None if it was not pending.
    async fn resolve_join_request(
        &self,
        id: Uuid,
        status: JoinRequestStatus,
        reviewed_by: Option<&str>,
    ) -> AppResult<Option<ClubJoinRequest>>;
    /// Marks a PENDING request APPROVED and inserts the MEMBER row atomically.
    async fn approve_join_request(&self, id: Uuid, reviewed_by: &str) -> AppResult<ClubMember>;

    // --- Bans ---
    /// Inserts the ban, deletes the membership and cancels any pending request atomically.
    async fn ban_member(&self, ban: &ClubBan) -> AppResult<ClubBan>;
    async fn get_ban(&self, club_id: Uuid, user_id: &str) -> AppResult<Option<ClubBan>>;
    async fn delete_ban(&self, club_id: Uuid, user_id: &str) -> AppResult<bool>;
    async fn list_bans(&self, club_id: Uuid) -> AppResult<Vec<ClubBan>>;

    // --- Posts ---
    async fn insert_post(&self, post: &ClubPost) -> AppResult<ClubPost>;
    async fn get_post(&self, id: Uuid) -> AppResult<Option<ClubPost>>;
    async fn get_post_view(&self, id: Uuid, viewer: Option<&str>) -> AppResult<Option<PostView>>;
    /// Without `before`: every pinned post, then up to `limit` unpinned posts. With
    /// `before`: up to `limit` unpinned posts past the cursor. Both orders are
    /// `(created_at, id)` descending; `limit` never counts pinned posts.
    async fn list_post_views(
        &self,
        club_id: Uuid,
        viewer: Option<&str>,
        before: Option<FeedCursor>,
        limit: i64,
    ) -> AppResult<Vec<PostView>>;
    async fn update_post(&self, id: Uuid, req: &UpdatePostRequest) -> AppResult<Option<ClubPost>>;
    async fn set_post_pinned(&self, id: Uuid, pinned: bool) -> AppResult<Option<ClubPost>>;
    async fn delete_post(&self, id: Uuid) -> AppResult<bool>;
    /// True if a like row was inserted, false if it already existed.
    async fn like_post(&self, post_id: Uuid, user_id: &str) -> AppResult<bool>;
    /// True if a like row was removed.
    async fn unlike_post(&self, post_id: Uuid, user_id: &str) -> AppResult<bool>;
    async fn post_like_count(&self, post_id: Uuid) -> AppResult<i64>;

    // --- Comments ---
    async fn insert_comment(&self, comment: &PostComment) -> AppResult<PostComment>;
    async fn get_comment(&self, id: Uuid) -> AppResult<Option<PostComment>>;
    /// Oldest first.
    async fn list_comment_views(
        &self,
        post_id: Uuid,
        viewer: Option<&str>,
    ) -> AppResult<Vec<CommentView>>;
    async fn delete_comment(&self, id: Uuid) -> AppResult<bool>;
    async fn like_comment(&self, comment_id: Uuid, user_id: &str) -> AppResult<bool>;
    async fn unlike_comment(&self, comment_id: Uuid, user_id: &str) -> AppResult<bool>;
    async fn comment_like_count(&self, comment_id: Uuid) -> AppResult<i64>;

    // --- Events ---
    async fn insert_event(&self, event: &ClubEvent) -> AppResult<ClubEvent>;
    async fn get_event(&self, id: Uuid) -> AppResult<Option<ClubEvent>>;
    /// Ordered by `starts_at`. With `ends_after`, events that ended by then are skipped.
    async fn list_events(
        &self,
        club_id: Uuid,
        ends_after: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ClubEvent>>;
    async fn update_event(&self, event: &ClubEvent) -> AppResult<Option<ClubEvent>>;
    async fn delete_event(&self, id: Uuid) -> AppResult<bool>;
    async fn get_attendee(&self, event_id: Uuid, user_id: &str) -> AppResult<Option<EventAttendee>>;
    /// Records an RSVP. A move to GOING is checked against the event's capacity in the
    /// same critical section as the write; a full event yields `Conflict`, and a user
    /// already GOING keeps their place.
    async fn upsert_attendee(&self, attendee: &EventAttendee) -> AppResult<EventAttendee>;
    async fn delete_attendee(&self, event_id: Uuid, user_id: &str) -> AppResult<bool>;
    async fn list_attendees(&self, event_id: Uuid) -> AppResult<Vec<AttendeeView>>;
    async fn attendance_counts(&self, event_id: Uuid) -> AppResult<AttendanceCounts>;

    // --- Challenges ---
    async fn insert_challenge(&self, challenge: &Challenge) -> AppResult<Challenge>;
    async fn get_challenge(&self, id: Uuid) -> AppResult<Option<Challenge>>;
    async fn list_challenges(&self, club_id: Uuid) -> AppResult<Vec<Challenge>>;
    async fn delete_challenge(&self, id: Uuid) -> AppResult<bool>;
    async fn insert_participant(
        &self,
        participant: &ChallengeParticipant,
    ) -> AppResult<ChallengeParticipant>;
    async fn get_participant(
        &self,
        challenge_id: Uuid,
        user_id: &str,
    ) -> AppResult<Option<ChallengeParticipant>>;
    async fn delete_participant(&self, challenge_id: Uuid, user_id: &str) -> AppResult<bool>;
    async fn participant_count(&self, challenge_id: Uuid) -> AppResult<i64>;
    async fn insert_entry(&self, entry: &LeaderboardEntry) -> AppResult<LeaderboardEntry>;
    async fn list_entries(&self, challenge_id: Uuid) -> AppResult<Vec<LeaderboardEntry>>;

    // --- Audit ---
    async fn insert_audit_log(&self, entry: &AuditLog) -> AppResult<()>;
    /// Newest first. `club_id = None` lists every club and site-level entry.
    async fn list_audit_logs(&self, club_id: Option<Uuid>, limit: i64) -> AppResult<Vec<AuditLog>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
