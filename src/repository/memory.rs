use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AttendanceCounts, Repository};
use crate::{
    error::{AppError, AppResult},
    models::{
        AttendanceStatus, AttendeeView, AuditLog, Challenge, ChallengeParticipant, Club, ClubBan,
        ClubEvent, ClubFilter, ClubJoinRequest, ClubMember, ClubPost, ClubRole, CommentView,
        EventAttendee, FeedCursor, JoinRequestStatus, LeaderboardEntry, MemberView, PostComment,
        PostView, SiteRole, SiteStats, UpdateClubRequest, UpdatePostRequest, UpdateProfileRequest,
        User,
    },
};

type MemberKey = (Uuid, String);

#[derive(Default)]
struct Store {
    users: HashMap<String, User>,
    clubs: HashMap<Uuid, Club>,
    members: HashMap<MemberKey, ClubMember>,
    join_requests: HashMap<Uuid, ClubJoinRequest>,
    bans: HashMap<MemberKey, ClubBan>,
    posts: HashMap<Uuid, ClubPost>,
    comments: HashMap<Uuid, PostComment>,
    post_likes: HashSet<MemberKey>,
    comment_likes: HashSet<MemberKey>,
    events: HashMap<Uuid, ClubEvent>,
    attendees: HashMap<MemberKey, EventAttendee>,
    challenges: HashMap<Uuid, Challenge>,
    participants: HashMap<MemberKey, ChallengeParticipant>,
    entries: Vec<LeaderboardEntry>,
    audit: Vec<AuditLog>,
}

impl Store {
    fn display_name(&self, user_id: &str) -> String {
        self.users
            .get(user_id)
            .map(|u| u.display_name.clone())
            .unwrap_or_else(|| user_id.to_string())
    }

    fn post_view(&self, post: &ClubPost, viewer: Option<&str>) -> PostView {
        let like_count = self.post_likes.iter().filter(|(id, _)| *id == post.id).count();
        let comment_count = self.comments.values().filter(|c| c.post_id == post.id).count();
        PostView {
            post: post.clone(),
            author_name: self.display_name(&post.author_id),
            like_count: like_count as i64,
            comment_count: comment_count as i64,
            liked_by_viewer: viewer
                .is_some_and(|v| self.post_likes.contains(&(post.id, v.to_string()))),
        }
    }

    fn comment_view(&self, comment: &PostComment, viewer: Option<&str>) -> CommentView {
        let like_count = self
            .comment_likes
            .iter()
            .filter(|(id, _)| *id == comment.id)
            .count();
        CommentView {
            comment: comment.clone(),
            author_name: self.display_name(&comment.author_id),
            like_count: like_count as i64,
            liked_by_viewer: viewer
                .is_some_and(|v| self.comment_likes.contains(&(comment.id, v.to_string()))),
        }
    }

    fn remove_post(&mut self, post_id: Uuid) -> bool {
        if self.posts.remove(&post_id).is_none() {
            return false;
        }
        let comment_ids: Vec<Uuid> = self
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.id)
            .collect();
        for id in comment_ids {
            self.remove_comment(id);
        }
        self.post_likes.retain(|(id, _)| *id != post_id);
        true
    }

    fn remove_comment(&mut self, comment_id: Uuid) -> bool {
        let removed = self.comments.remove(&comment_id).is_some();
        self.comment_likes.retain(|(id, _)| *id != comment_id);
        removed
    }

    fn remove_event(&mut self, event_id: Uuid) -> bool {
        let removed = self.events.remove(&event_id).is_some();
        self.attendees.retain(|(id, _), _| *id != event_id);
        removed
    }

    fn remove_challenge(&mut self, challenge_id: Uuid) -> bool {
        let removed = self.challenges.remove(&challenge_id).is_some();
        self.participants.retain(|(id, _), _| *id != challenge_id);
        self.entries.retain(|e| e.challenge_id != challenge_id);
        removed
    }
}

/// InMemoryRepository
///
/// `Repository` backed by process memory. Used when no `DATABASE_URL` is configured in
/// local mode, and by the router tests. A single `RwLock` over the whole store makes
/// each trait call atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- Users ---

    async fn get_user(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.store.read().await.users.get(id).cloned())
    }

    async fn ensure_user(&self, user: &User) -> AppResult<User> {
        let mut store = self.store.write().await;
        let stored = store
            .users
            .entry(user.id.clone())
            .or_insert_with(|| user.clone());
        Ok(stored.clone())
    }

    async fn update_profile(&self, id: &str, req: &UpdateProfileRequest) -> AppResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(id).map(|user| {
            if let Some(name) = &req.display_name {
                user.display_name = name.trim().to_string();
            }
            if let Some(url) = &req.avatar_url {
                user.avatar_url = Some(url.clone());
            }
            user.clone()
        }))
    }

    async fn set_site_role(&self, id: &str, role: SiteRole) -> AppResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(id).map(|user| {
            user.site_role = role;
            user.clone()
        }))
    }

    async fn display_names(&self, ids: &[String]) -> AppResult<HashMap<String, String>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                store
                    .users
                    .get(id)
                    .map(|u| (id.clone(), u.display_name.clone()))
            })
            .collect())
    }

    async fn get_stats(&self) -> AppResult<SiteStats> {
        let store = self.store.read().await;
        Ok(SiteStats {
            total_users: store.users.len() as i64,
            total_clubs: store.clubs.len() as i64,
            total_posts: store.posts.len() as i64,
            total_events: store.events.len() as i64,
            total_challenges: store.challenges.len() as i64,
        })
    }

    // --- Clubs ---

    async fn create_club(&self, club: &Club) -> AppResult<Club> {
        let mut store = self.store.write().await;
        if store.clubs.values().any(|c| c.slug == club.slug) {
            return Err(AppError::conflict("a club with this name already exists"));
        }
        store.clubs.insert(club.id, club.clone());
        store.members.insert(
            (club.id, club.created_by.clone()),
            ClubMember {
                club_id: club.id,
                user_id: club.created_by.clone(),
                role: ClubRole::Admin,
                joined_at: club.created_at,
            },
        );
        Ok(club.clone())
    }

    async fn get_club(&self, id: Uuid) -> AppResult<Option<Club>> {
        Ok(self.store.read().await.clubs.get(&id).cloned())
    }

    async fn list_clubs(&self, filter: &ClubFilter) -> AppResult<Vec<Club>> {
        let store = self.store.read().await;
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut clubs: Vec<Club> = store
            .clubs
            .values()
            .filter(|c| filter.visibility.is_none_or(|v| c.visibility == v))
            .filter(|c| {
                needle.as_ref().is_none_or(|n| {
                    c.name.to_lowercase().contains(n) || c.description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        clubs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(clubs)
    }

    async fn list_clubs_for_user(&self, user_id: &str) -> AppResult<Vec<Club>> {
        let store = self.store.read().await;
        let mut memberships: Vec<&ClubMember> = store
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .collect();
        memberships.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(memberships
            .into_iter()
            .filter_map(|m| store.clubs.get(&m.club_id).cloned())
            .collect())
    }

    async fn update_club(&self, id: Uuid, req: &UpdateClubRequest) -> AppResult<Option<Club>> {
        let mut store = self.store.write().await;
        Ok(store.clubs.get_mut(&id).map(|club| {
            if let Some(description) = &req.description {
                club.description = description.clone();
            }
            if let Some(visibility) = req.visibility {
                club.visibility = visibility;
            }
            if let Some(location) = &req.location {
                club.location = Some(location.clone());
            }
            if let Some(image_url) = &req.image_url {
                club.image_url = Some(image_url.clone());
            }
            club.updated_at = Utc::now();
            club.clone()
        }))
    }

    async fn delete_club(&self, id: Uuid) -> AppResult<bool> {
        let mut store = self.store.write().await;
        if store.clubs.remove(&id).is_none() {
            return Ok(false);
        }
        store.members.retain(|(club_id, _), _| *club_id != id);
        store.bans.retain(|(club_id, _), _| *club_id != id);
        store.join_requests.retain(|_, r| r.club_id != id);

        let posts: Vec<Uuid> = store.posts.values().filter(|p| p.club_id == id).map(|p| p.id).collect();
        for post_id in posts {
            store.remove_post(post_id);
        }
        let events: Vec<Uuid> = store.events.values().filter(|e| e.club_id == id).map(|e| e.id).collect();
        for event_id in events {
            store.remove_event(event_id);
        }
        let challenges: Vec<Uuid> = store
            .challenges
            .values()
            .filter(|c| c.club_id == id)
            .map(|c| c.id)
            .collect();
        for challenge_id in challenges {
            store.remove_challenge(challenge_id);
        }
        Ok(true)
    }

    async fn member_counts(&self, club_ids: &[Uuid]) -> AppResult<HashMap<Uuid, i64>> {
        let store = self.store.read().await;
        let mut counts: HashMap<Uuid, i64> = club_ids.iter().map(|id| (*id, 0)).collect();
        for (club_id, _) in store.members.keys() {
            if let Some(count) = counts.get_mut(club_id) {
                *count += 1;
            }
        }
        Ok(counts)
    }

    // --- Memberships ---

    async fn insert_member(&self, member: &ClubMember) -> AppResult<ClubMember> {
        let mut store = self.store.write().await;
        let key = (member.club_id, member.user_id.clone());
        if store.members.contains_key(&key) {
            return Err(AppError::conflict("already a member of this club"));
        }
        store.members.insert(key, member.clone());
        Ok(member.clone())
    }

    async fn get_member(&self, club_id: Uuid, user_id: &str) -> AppResult<Option<ClubMember>> {
        let store = self.store.read().await;
        Ok(store.members.get(&(club_id, user_id.to_string())).cloned())
    }

    async fn list_members(&self, club_id: Uuid) -> AppResult<Vec<MemberView>> {
        let store = self.store.read().await;
        let mut members: Vec<MemberView> = store
            .members
            .values()
            .filter(|m| m.club_id == club_id)
            .map(|m| {
                let user = store.users.get(&m.user_id);
                MemberView {
                    user_id: m.user_id.clone(),
                    display_name: store.display_name(&m.user_id),
                    avatar_url: user.and_then(|u| u.avatar_url.clone()),
                    role: m.role,
                    joined_at: m.joined_at,
                }
            })
            .collect();
        members.sort_by(|a, b| {
            b.role
                .rank()
                .cmp(&a.role.rank())
                .then(a.joined_at.cmp(&b.joined_at))
        });
        Ok(members)
    }

    async fn list_memberships(&self, user_id: &str) -> AppResult<Vec<ClubMember>> {
        let store = self.store.read().await;
        Ok(store
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_member_role(
        &self,
        club_id: Uuid,
        user_id: &str,
        role: ClubRole,
    ) -> AppResult<Option<ClubMember>> {
        let mut store = self.store.write().await;
        Ok(store
            .members
            .get_mut(&(club_id, user_id.to_string()))
            .map(|m| {
                m.role = role;
                m.clone()
            }))
    }

    async fn delete_member(&self, club_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.members.remove(&(club_id, user_id.to_string())).is_some())
    }

    // --- Join requests ---

    async fn insert_join_request(&self, request: &ClubJoinRequest) -> AppResult<ClubJoinRequest> {
        let mut store = self.store.write().await;
        let duplicate = store.join_requests.values().any(|r| {
            r.club_id == request.club_id
                && r.user_id == request.user_id
                && r.status == JoinRequestStatus::Pending
        });
        if duplicate {
            return Err(AppError::conflict("a join request is already pending"));
        }
        store.join_requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn get_join_request(&self, id: Uuid) -> AppResult<Option<ClubJoinRequest>> {
        Ok(self.store.read().await.join_requests.get(&id).cloned())
    }

    async fn find_pending_request(
        &self,
        club_id: Uuid,
        user_id: &str,
    ) -> AppResult<Option<ClubJoinRequest>> {
        let store = self.store.read().await;
        Ok(store
            .join_requests
            .values()
            .find(|r| {
                r.club_id == club_id
                    && r.user_id == user_id
                    && r.status == JoinRequestStatus::Pending
            })
            .cloned())
    }

    async fn list_join_requests(
        &self,
        club_id: Uuid,
        status: JoinRequestStatus,
    ) -> AppResult<Vec<ClubJoinRequest>> {
        let store = self.store.read().await;
        let mut requests: Vec<ClubJoinRequest> = store
            .join_requests
            .values()
            .filter(|r| r.club_id == club_id && r.status == status)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(requests)
    }

    async fn resolve_join_request(
        &self,
        id: Uuid,
        status: JoinRequestStatus,
        reviewed_by: Option<&str>,
    ) -> AppResult<Option<ClubJoinRequest>> {
        let mut store = self.store.write().await;
        Ok(store
            .join_requests
            .get_mut(&id)
            .filter(|r| r.status == JoinRequestStatus::Pending)
            .map(|r| {
                r.status = status;
                r.reviewed_by = reviewed_by.map(str::to_string);
                r.reviewed_at = Some(Utc::now());
                r.clone()
            }))
    }

    async fn approve_join_request(&self, id: Uuid, reviewed_by: &str) -> AppResult<ClubMember> {
        let mut store = self.store.write().await;
        let request = store
            .join_requests
            .get(&id)
            .filter(|r| r.status == JoinRequestStatus::Pending)
            .cloned()
            .ok_or_else(|| AppError::not_found("pending join request"))?;

        let key = (request.club_id, request.user_id.clone());
        if store.members.contains_key(&key) {
            return Err(AppError::conflict("already a member of this club"));
        }

        let now = Utc::now();
        let member = ClubMember {
            club_id: request.club_id,
            user_id: request.user_id.clone(),
            role: ClubRole::Member,
            joined_at: now,
        };
        store.members.insert(key, member.clone());
        if let Some(r) = store.join_requests.get_mut(&id) {
            r.status = JoinRequestStatus::Approved;
            r.reviewed_by = Some(reviewed_by.to_string());
            r.reviewed_at = Some(now);
        }
        Ok(member)
    }

    // --- Bans ---

    async fn ban_member(&self, ban: &ClubBan) -> AppResult<ClubBan> {
        let mut store = self.store.write().await;
        let key = (ban.club_id, ban.user_id.clone());
        if store.bans.contains_key(&key) {
            return Err(AppError::conflict("user is already banned"));
        }
        store.bans.insert(key.clone(), ban.clone());
        store.members.remove(&key);
        let now = Utc::now();
        for request in store.join_requests.values_mut() {
            if request.club_id == ban.club_id
                && request.user_id == ban.user_id
                && request.status == JoinRequestStatus::Pending
            {
                request.status = JoinRequestStatus::Cancelled;
                request.reviewed_by = Some(ban.banned_by.clone());
                request.reviewed_at = Some(now);
            }
        }
        Ok(ban.clone())
    }

    async fn get_ban(&self, club_id: Uuid, user_id: &str) -> AppResult<Option<ClubBan>> {
        let store = self.store.read().await;
        Ok(store.bans.get(&(club_id, user_id.to_string())).cloned())
    }

    async fn delete_ban(&self, club_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.bans.remove(&(club_id, user_id.to_string())).is_some())
    }

    async fn list_bans(&self, club_id: Uuid) -> AppResult<Vec<ClubBan>> {
        let store = self.store.read().await;
        let mut bans: Vec<ClubBan> = store
            .bans
            .values()
            .filter(|b| b.club_id == club_id)
            .cloned()
            .collect();
        bans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bans)
    }

    // --- Posts ---

    async fn insert_post(&self, post: &ClubPost) -> AppResult<ClubPost> {
        let mut store = self.store.write().await;
        store.posts.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<ClubPost>> {
        Ok(self.store.read().await.posts.get(&id).cloned())
    }

    async fn get_post_view(&self, id: Uuid, viewer: Option<&str>) -> AppResult<Option<PostView>> {
        let store = self.store.read().await;
        Ok(store.posts.get(&id).map(|p| store.post_view(p, viewer)))
    }

    async fn list_post_views(
        &self,
        club_id: Uuid,
        viewer: Option<&str>,
        before: Option<FeedCursor>,
        limit: i64,
    ) -> AppResult<Vec<PostView>> {
        let store = self.store.read().await;
        let newest_first =
            |a: &&ClubPost, b: &&ClubPost| (b.created_at, b.id).cmp(&(a.created_at, a.id));
        let (mut pinned, mut unpinned): (Vec<&ClubPost>, Vec<&ClubPost>) = store
            .posts
            .values()
            .filter(|p| p.club_id == club_id)
            .partition(|p| p.is_pinned);
        unpinned.retain(|p| before.is_none_or(|cursor| cursor.is_after(p.created_at, p.id)));
        unpinned.sort_by(newest_first);
        unpinned.truncate(limit.max(0) as usize);

        if before.is_some() {
            pinned.clear();
        }
        pinned.sort_by(newest_first);
        Ok(pinned
            .into_iter()
            .chain(unpinned)
            .map(|p| store.post_view(p, viewer))
            .collect())
    }

    async fn update_post(&self, id: Uuid, req: &UpdatePostRequest) -> AppResult<Option<ClubPost>> {
        let mut store = self.store.write().await;
        Ok(store.posts.get_mut(&id).map(|post| {
            if let Some(content) = &req.content {
                post.content = content.clone();
            }
            if let Some(media_url) = &req.media_url {
                post.media_url = Some(media_url.clone());
            }
            post.updated_at = Utc::now();
            post.clone()
        }))
    }

    async fn set_post_pinned(&self, id: Uuid, pinned: bool) -> AppResult<Option<ClubPost>> {
        let mut store = self.store.write().await;
        Ok(store.posts.get_mut(&id).map(|post| {
            post.is_pinned = pinned;
            post.clone()
        }))
    }

    async fn delete_post(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.store.write().await.remove_post(id))
    }

    async fn like_post(&self, post_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.post_likes.insert((post_id, user_id.to_string())))
    }

    async fn unlike_post(&self, post_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.post_likes.remove(&(post_id, user_id.to_string())))
    }

    async fn post_like_count(&self, post_id: Uuid) -> AppResult<i64> {
        let store = self.store.read().await;
        Ok(store.post_likes.iter().filter(|(id, _)| *id == post_id).count() as i64)
    }

    // --- Comments ---

    async fn insert_comment(&self, comment: &PostComment) -> AppResult<PostComment> {
        let mut store = self.store.write().await;
        store.comments.insert(comment.id, comment.clone());
        Ok(comment.clone())
    }

    async fn get_comment(&self, id: Uuid) -> AppResult<Option<PostComment>> {
        Ok(self.store.read().await.comments.get(&id).cloned())
    }

    async fn list_comment_views(
        &self,
        post_id: Uuid,
        viewer: Option<&str>,
    ) -> AppResult<Vec<CommentView>> {
        let store = self.store.read().await;
        let mut comments: Vec<&PostComment> = store
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments
            .into_iter()
            .map(|c| store.comment_view(c, viewer))
            .collect())
    }

    async fn delete_comment(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.store.write().await.remove_comment(id))
    }

    async fn like_comment(&self, comment_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.comment_likes.insert((comment_id, user_id.to_string())))
    }

    async fn unlike_comment(&self, comment_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.comment_likes.remove(&(comment_id, user_id.to_string())))
    }

    async fn comment_like_count(&self, comment_id: Uuid) -> AppResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .comment_likes
            .iter()
            .filter(|(id, _)| *id == comment_id)
            .count() as i64)
    }

    // --- Events ---

    async fn insert_event(&self, event: &ClubEvent) -> AppResult<ClubEvent> {
        let mut store = self.store.write().await;
        store.events.insert(event.id, event.clone());
        Ok(event.clone())
    }

    async fn get_event(&self, id: Uuid) -> AppResult<Option<ClubEvent>> {
        Ok(self.store.read().await.events.get(&id).cloned())
    }

    async fn list_events(
        &self,
        club_id: Uuid,
        ends_after: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ClubEvent>> {
        let store = self.store.read().await;
        let mut events: Vec<ClubEvent> = store
            .events
            .values()
            .filter(|e| e.club_id == club_id)
            .filter(|e| ends_after.is_none_or(|t| e.ends_at > t))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(events)
    }

    async fn update_event(&self, event: &ClubEvent) -> AppResult<Option<ClubEvent>> {
        let mut store = self.store.write().await;
        Ok(store.events.get_mut(&event.id).map(|stored| {
            *stored = ClubEvent {
                updated_at: Utc::now(),
                ..event.clone()
            };
            stored.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.store.write().await.remove_event(id))
    }

    async fn get_attendee(&self, event_id: Uuid, user_id: &str) -> AppResult<Option<EventAttendee>> {
        let store = self.store.read().await;
        Ok(store.attendees.get(&(event_id, user_id.to_string())).cloned())
    }

    async fn upsert_attendee(&self, attendee: &EventAttendee) -> AppResult<EventAttendee> {
        let mut store = self.store.write().await;
        let event = store
            .events
            .get(&attendee.event_id)
            .ok_or_else(|| AppError::not_found("event"))?;
        if let (AttendanceStatus::Going, Some(capacity)) = (attendee.status, event.capacity) {
            let others_going = store
                .attendees
                .values()
                .filter(|a| a.event_id == attendee.event_id && a.user_id != attendee.user_id)
                .filter(|a| a.status == AttendanceStatus::Going)
                .count();
            if others_going >= capacity.max(0) as usize {
                return Err(AppError::conflict("event is at capacity"));
            }
        }
        store.attendees.insert(
            (attendee.event_id, attendee.user_id.clone()),
            attendee.clone(),
        );
        Ok(attendee.clone())
    }

    async fn delete_attendee(&self, event_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.attendees.remove(&(event_id, user_id.to_string())).is_some())
    }

    async fn list_attendees(&self, event_id: Uuid) -> AppResult<Vec<AttendeeView>> {
        let store = self.store.read().await;
        let mut attendees: Vec<AttendeeView> = store
            .attendees
            .values()
            .filter(|a| a.event_id == event_id)
            .map(|a| AttendeeView {
                user_id: a.user_id.clone(),
                display_name: store.display_name(&a.user_id),
                status: a.status,
                responded_at: a.responded_at,
            })
            .collect();
        attendees.sort_by(|a, b| a.responded_at.cmp(&b.responded_at));
        Ok(attendees)
    }

    async fn attendance_counts(&self, event_id: Uuid) -> AppResult<AttendanceCounts> {
        let store = self.store.read().await;
        let mut counts = AttendanceCounts::default();
        for attendee in store.attendees.values().filter(|a| a.event_id == event_id) {
            match attendee.status {
                AttendanceStatus::Going => counts.going += 1,
                AttendanceStatus::Interested => counts.interested += 1,
            }
        }
        Ok(counts)
    }

    // --- Challenges ---

    async fn insert_challenge(&self, challenge: &Challenge) -> AppResult<Challenge> {
        let mut store = self.store.write().await;
        store.challenges.insert(challenge.id, challenge.clone());
        Ok(challenge.clone())
    }

    async fn get_challenge(&self, id: Uuid) -> AppResult<Option<Challenge>> {
        Ok(self.store.read().await.challenges.get(&id).cloned())
    }

    async fn list_challenges(&self, club_id: Uuid) -> AppResult<Vec<Challenge>> {
        let store = self.store.read().await;
        let mut challenges: Vec<Challenge> = store
            .challenges
            .values()
            .filter(|c| c.club_id == club_id)
            .cloned()
            .collect();
        challenges.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        Ok(challenges)
    }

    async fn delete_challenge(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.store.write().await.remove_challenge(id))
    }

    async fn insert_participant(
        &self,
        participant: &ChallengeParticipant,
    ) -> AppResult<ChallengeParticipant> {
        let mut store = self.store.write().await;
        let key = (participant.challenge_id, participant.user_id.clone());
        if store.participants.contains_key(&key) {
            return Err(AppError::conflict("already participating in this challenge"));
        }
        store.participants.insert(key, participant.clone());
        Ok(participant.clone())
    }

    async fn get_participant(
        &self,
        challenge_id: Uuid,
        user_id: &str,
    ) -> AppResult<Option<ChallengeParticipant>> {
        let store = self.store.read().await;
        Ok(store
            .participants
            .get(&(challenge_id, user_id.to_string()))
            .cloned())
    }

    async fn delete_participant(&self, challenge_id: Uuid, user_id: &str) -> AppResult<bool> {
        let mut store = self.store.write().await;
        Ok(store
            .participants
            .remove(&(challenge_id, user_id.to_string()))
            .is_some())
    }

    async fn participant_count(&self, challenge_id: Uuid) -> AppResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .participants
            .keys()
            .filter(|(id, _)| *id == challenge_id)
            .count() as i64)
    }

    async fn insert_entry(&self, entry: &LeaderboardEntry) -> AppResult<LeaderboardEntry> {
        let mut store = self.store.write().await;
        store.entries.push(entry.clone());
        Ok(entry.clone())
    }

    async fn list_entries(&self, challenge_id: Uuid) -> AppResult<Vec<LeaderboardEntry>> {
        let store = self.store.read().await;
        Ok(store
            .entries
            .iter()
            .filter(|e| e.challenge_id == challenge_id)
            .cloned()
            .collect())
    }

    // --- Audit ---

    async fn insert_audit_log(&self, entry: &AuditLog) -> AppResult<()> {
        self.store.write().await.audit.push(entry.clone());
        Ok(())
    }

    async fn list_audit_logs(&self, club_id: Option<Uuid>, limit: i64) -> AppResult<Vec<AuditLog>> {
        let store = self.store.read().await;
        Ok(store
            .audit
            .iter()
            .rev()
            .filter(|e| club_id.is_none() || e.club_id == club_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
