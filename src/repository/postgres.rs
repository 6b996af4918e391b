use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, query_builder::QueryBuilder};
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

const CLUB_COLUMNS: &str = "id, name, slug, description, visibility, location, image_url, \
                            created_by, created_at, updated_at";

const POST_VIEW_SELECT: &str = r#"
    SELECT
        p.id, p.club_id, p.author_id, p.content, p.media_url, p.is_pinned,
        p.created_at, p.updated_at,
        COALESCE(u.display_name, p.author_id) AS author_name,
        (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
        (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS comment_count,
        EXISTS (
            SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = $1
        ) AS liked_by_viewer
    FROM club_posts p
    LEFT JOIN users u ON u.id = p.author_id
"#;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Every query is parameterized;
/// enum columns are stored as their TEXT form.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users ---

    async fn get_user(&self, id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, avatar_url, site_role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// ensure_user
    ///
    /// `ON CONFLICT DO NOTHING` keeps concurrent first logins for the same subject from
    /// failing; the follow-up select returns whichever row won.
    async fn ensure_user(&self, user: &User) -> AppResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, avatar_url, site_role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(user.site_role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        self.get_user(&user.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("user {} vanished after insert", user.id)))
    }

    async fn update_profile(&self, id: &str, req: &UpdateProfileRequest) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                avatar_url = COALESCE($3, avatar_url)
            WHERE id = $1
            RETURNING id, email, display_name, avatar_url, site_role, created_at
            "#,
        )
        .bind(id)
        .bind(req.display_name.as_deref().map(str::trim))
        .bind(&req.avatar_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_site_role(&self, id: &str, role: SiteRole) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET site_role = $2 WHERE id = $1
            RETURNING id, email, display_name, avatar_url, site_role, created_at
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn display_names(&self, ids: &[String]) -> AppResult<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, display_name FROM users WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// get_stats
    ///
    /// Site-wide counters in one round trip via scalar subqueries.
    async fn get_stats(&self) -> AppResult<SiteStats> {
        let stats = sqlx::query_as::<_, SiteStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM clubs) AS total_clubs,
                (SELECT COUNT(*) FROM club_posts) AS total_posts,
                (SELECT COUNT(*) FROM club_events) AS total_events,
                (SELECT COUNT(*) FROM challenges) AS total_challenges
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    // --- Clubs ---

    async fn create_club(&self, club: &Club) -> AppResult<Club> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Club>(&format!(
            r#"
            INSERT INTO clubs ({CLUB_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {CLUB_COLUMNS}
            "#
        ))
        .bind(club.id)
        .bind(&club.name)
        .bind(&club.slug)
        .bind(&club.description)
        .bind(club.visibility.as_str())
        .bind(&club.location)
        .bind(&club.image_url)
        .bind(&club.created_by)
        .bind(club.created_at)
        .bind(club.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_insert(e, "a club with this name already exists"))?;

        sqlx::query(
            "INSERT INTO club_members (club_id, user_id, role, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(created.id)
        .bind(&created.created_by)
        .bind(ClubRole::Admin.as_str())
        .bind(created.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_club(&self, id: Uuid) -> AppResult<Option<Club>> {
        let club = sqlx::query_as::<_, Club>(&format!(
            "SELECT {CLUB_COLUMNS} FROM clubs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(club)
    }

    /// list_clubs
    ///
    /// Optional visibility filter and case-insensitive search over name and description,
    /// assembled with QueryBuilder so every value stays a bind parameter.
    async fn list_clubs(&self, filter: &ClubFilter) -> AppResult<Vec<Club>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {CLUB_COLUMNS} FROM clubs WHERE 1 = 1"));

        if let Some(visibility) = filter.visibility {
            builder.push(" AND visibility = ");
            builder.push_bind(visibility.as_str());
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        let clubs = builder
            .build_query_as::<Club>()
            .fetch_all(&self.pool)
            .await?;
        Ok(clubs)
    }

    async fn list_clubs_for_user(&self, user_id: &str) -> AppResult<Vec<Club>> {
        let clubs = sqlx::query_as::<_, Club>(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.visibility, c.location, c.image_url,
                   c.created_by, c.created_at, c.updated_at
            FROM clubs c
            JOIN club_members m ON m.club_id = c.id
            WHERE m.user_id = $1
            ORDER BY m.joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(clubs)
    }

    async fn update_club(&self, id: Uuid, req: &UpdateClubRequest) -> AppResult<Option<Club>> {
        let club = sqlx::query_as::<_, Club>(&format!(
            r#"
            UPDATE clubs
            SET description = COALESCE($2, description),
                visibility = COALESCE($3, visibility),
                location = COALESCE($4, location),
                image_url = COALESCE($5, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CLUB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&req.description)
        .bind(req.visibility.map(|v| v.as_str()))
        .bind(&req.location)
        .bind(&req.image_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(club)
    }

    async fn delete_club(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM clubs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn member_counts(&self, club_ids: &[Uuid]) -> AppResult<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT club_id, COUNT(*) FROM club_members
            WHERE club_id = ANY($1)
            GROUP BY club_id
            "#,
        )
        .bind(club_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: HashMap<Uuid, i64> = club_ids.iter().map(|id| (*id, 0)).collect();
        counts.extend(rows);
        Ok(counts)
    }

    // --- Memberships ---

    async fn insert_member(&self, member: &ClubMember) -> AppResult<ClubMember> {
        let inserted = sqlx::query_as::<_, ClubMember>(
            r#"
            INSERT INTO club_members (club_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            RETURNING club_id, user_id, role, joined_at
            "#,
        )
        .bind(member.club_id)
        .bind(&member.user_id)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "already a member of this club"))?;
        Ok(inserted)
    }

    async fn get_member(&self, club_id: Uuid, user_id: &str) -> AppResult<Option<ClubMember>> {
        let member = sqlx::query_as::<_, ClubMember>(
            "SELECT club_id, user_id, role, joined_at FROM club_members WHERE club_id = $1 AND user_id = $2",
        )
        .bind(club_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn list_members(&self, club_id: Uuid) -> AppResult<Vec<MemberView>> {
        let members = sqlx::query_as::<_, MemberView>(
            r#"
            SELECT m.user_id,
                   COALESCE(u.display_name, m.user_id) AS display_name,
                   u.avatar_url,
                   m.role,
                   m.joined_at
            FROM club_members m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.club_id = $1
            ORDER BY CASE m.role WHEN 'ADMIN' THEN 0 WHEN 'MODERATOR' THEN 1 ELSE 2 END,
                     m.joined_at ASC
            "#,
        )
        .bind(club_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn list_memberships(&self, user_id: &str) -> AppResult<Vec<ClubMember>> {
        let members = sqlx::query_as::<_, ClubMember>(
            "SELECT club_id, user_id, role, joined_at FROM club_members WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn update_member_role(
        &self,
        club_id: Uuid,
        user_id: &str,
        role: ClubRole,
    ) -> AppResult<Option<ClubMember>> {
        let member = sqlx::query_as::<_, ClubMember>(
            r#"
            UPDATE club_members SET role = $3
            WHERE club_id = $1 AND user_id = $2
            RETURNING club_id, user_id, role, joined_at
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn delete_member(&self, club_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM club_members WHERE club_id = $1 AND user_id = $2")
            .bind(club_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Join requests ---

    async fn insert_join_request(&self, request: &ClubJoinRequest) -> AppResult<ClubJoinRequest> {
        let inserted = sqlx::query_as::<_, ClubJoinRequest>(
            r#"
            INSERT INTO club_join_requests (id, club_id, user_id, message, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, club_id, user_id, message, status, created_at, reviewed_by, reviewed_at
            "#,
        )
        .bind(request.id)
        .bind(request.club_id)
        .bind(&request.user_id)
        .bind(&request.message)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "a join request is already pending"))?;
        Ok(inserted)
    }

    async fn get_join_request(&self, id: Uuid) -> AppResult<Option<ClubJoinRequest>> {
        let request = sqlx::query_as::<_, ClubJoinRequest>(
            r#"
            SELECT id, club_id, user_id, message, status, created_at, reviewed_by, reviewed_at
            FROM club_join_requests WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn find_pending_request(
        &self,
        club_id: Uuid,
        user_id: &str,
    ) -> AppResult<Option<ClubJoinRequest>> {
        let request = sqlx::query_as::<_, ClubJoinRequest>(
            r#"
            SELECT id, club_id, user_id, message, status, created_at, reviewed_by, reviewed_at
            FROM club_join_requests
            WHERE club_id = $1 AND user_id = $2 AND status = 'PENDING'
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn list_join_requests(
        &self,
        club_id: Uuid,
        status: JoinRequestStatus,
    ) -> AppResult<Vec<ClubJoinRequest>> {
        let requests = sqlx::query_as::<_, ClubJoinRequest>(
            r#"
            SELECT id, club_id, user_id, message, status, created_at, reviewed_by, reviewed_at
            FROM club_join_requests
            WHERE club_id = $1 AND status = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(club_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn resolve_join_request(
        &self,
        id: Uuid,
        status: JoinRequestStatus,
        reviewed_by: Option<&str>,
    ) -> AppResult<Option<ClubJoinRequest>> {
        let request = sqlx::query_as::<_, ClubJoinRequest>(
            r#"
            UPDATE club_join_requests
            SET status = $2, reviewed_by = $3, reviewed_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING id, club_id, user_id, message, status, created_at, reviewed_by, reviewed_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(reviewed_by)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    /// approve_join_request
    ///
    /// The status flip is guarded by `status = 'PENDING'`, so two reviewers racing on the
    /// same request cannot both insert a membership.
    async fn approve_join_request(&self, id: Uuid, reviewed_by: &str) -> AppResult<ClubMember> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, ClubJoinRequest>(
            r#"
            UPDATE club_join_requests
            SET status = 'APPROVED', reviewed_by = $2, reviewed_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING id, club_id, user_id, message, status, created_at, reviewed_by, reviewed_at
            "#,
        )
        .bind(id)
        .bind(reviewed_by)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("pending join request"))?;

        let member = sqlx::query_as::<_, ClubMember>(
            r#"
            INSERT INTO club_members (club_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING club_id, user_id, role, joined_at
            "#,
        )
        .bind(request.club_id)
        .bind(&request.user_id)
        .bind(ClubRole::Member.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_insert(e, "already a member of this club"))?;

        tx.commit().await?;
        Ok(member)
    }

    // --- Bans ---

    async fn ban_member(&self, ban: &ClubBan) -> AppResult<ClubBan> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, ClubBan>(
            r#"
            INSERT INTO club_bans (club_id, user_id, banned_by, reason, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING club_id, user_id, banned_by, reason, created_at
            "#,
        )
        .bind(ban.club_id)
        .bind(&ban.user_id)
        .bind(&ban.banned_by)
        .bind(&ban.reason)
        .bind(ban.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_insert(e, "user is already banned"))?;

        sqlx::query("DELETE FROM club_members WHERE club_id = $1 AND user_id = $2")
            .bind(ban.club_id)
            .bind(&ban.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE club_join_requests
            SET status = 'CANCELLED', reviewed_by = $3, reviewed_at = NOW()
            WHERE club_id = $1 AND user_id = $2 AND status = 'PENDING'
            "#,
        )
        .bind(ban.club_id)
        .bind(&ban.user_id)
        .bind(&ban.banned_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_ban(&self, club_id: Uuid, user_id: &str) -> AppResult<Option<ClubBan>> {
        let ban = sqlx::query_as::<_, ClubBan>(
            r#"
            SELECT club_id, user_id, banned_by, reason, created_at
            FROM club_bans WHERE club_id = $1 AND user_id = $2
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ban)
    }

    async fn delete_ban(&self, club_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM club_bans WHERE club_id = $1 AND user_id = $2")
            .bind(club_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_bans(&self, club_id: Uuid) -> AppResult<Vec<ClubBan>> {
        let bans = sqlx::query_as::<_, ClubBan>(
            r#"
            SELECT club_id, user_id, banned_by, reason, created_at
            FROM club_bans WHERE club_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(club_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bans)
    }

    // --- Posts ---

    async fn insert_post(&self, post: &ClubPost) -> AppResult<ClubPost> {
        let inserted = sqlx::query_as::<_, ClubPost>(
            r#"
            INSERT INTO club_posts
                (id, club_id, author_id, content, media_url, is_pinned, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, club_id, author_id, content, media_url, is_pinned, created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(post.club_id)
        .bind(&post.author_id)
        .bind(&post.content)
        .bind(&post.media_url)
        .bind(post.is_pinned)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<ClubPost>> {
        let post = sqlx::query_as::<_, ClubPost>(
            r#"
            SELECT id, club_id, author_id, content, media_url, is_pinned, created_at, updated_at
            FROM club_posts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn get_post_view(&self, id: Uuid, viewer: Option<&str>) -> AppResult<Option<PostView>> {
        let view = sqlx::query_as::<_, PostView>(&format!("{POST_VIEW_SELECT} WHERE p.id = $2"))
            .bind(viewer)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(view)
    }

    /// list_post_views
    ///
    /// The first page carries every pinned post plus `limit` unpinned ones, so the last
    /// row is always a valid cursor. Later pages are keyset-paginated over unpinned posts
    /// on `(created_at, id)`.
    async fn list_post_views(
        &self,
        club_id: Uuid,
        viewer: Option<&str>,
        before: Option<FeedCursor>,
        limit: i64,
    ) -> AppResult<Vec<PostView>> {
        let views = match before {
            Some(cursor) => {
                sqlx::query_as::<_, PostView>(&format!(
                    r#"{POST_VIEW_SELECT}
                    WHERE p.club_id = $2 AND p.is_pinned = FALSE
                      AND (p.created_at < $3
                           OR ($4::uuid IS NOT NULL AND p.created_at = $3 AND p.id < $4))
                    ORDER BY p.created_at DESC, p.id DESC
                    LIMIT $5"#
                ))
                .bind(viewer)
                .bind(club_id)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, PostView>(&format!(
                    r#"{POST_VIEW_SELECT}
                    WHERE p.club_id = $2
                      AND (p.is_pinned OR p.id IN (
                          SELECT id FROM club_posts
                          WHERE club_id = $2 AND is_pinned = FALSE
                          ORDER BY created_at DESC, id DESC
                          LIMIT $3
                      ))
                    ORDER BY p.is_pinned DESC, p.created_at DESC, p.id DESC"#
                ))
                .bind(viewer)
                .bind(club_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(views)
    }

    async fn update_post(&self, id: Uuid, req: &UpdatePostRequest) -> AppResult<Option<ClubPost>> {
        let post = sqlx::query_as::<_, ClubPost>(
            r#"
            UPDATE club_posts
            SET content = COALESCE($2, content),
                media_url = COALESCE($3, media_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, club_id, author_id, content, media_url, is_pinned, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&req.content)
        .bind(&req.media_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn set_post_pinned(&self, id: Uuid, pinned: bool) -> AppResult<Option<ClubPost>> {
        let post = sqlx::query_as::<_, ClubPost>(
            r#"
            UPDATE club_posts SET is_pinned = $2
            WHERE id = $1
            RETURNING id, club_id, author_id, content, media_url, is_pinned, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(pinned)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM club_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// like_post
    ///
    /// `ON CONFLICT DO NOTHING` against the (post_id, user_id) key; `rows_affected`
    /// tells the caller whether this was a new like.
    async fn like_post(&self, post_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO post_likes (post_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (post_id, user_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlike_post(&self, post_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn post_like_count(&self, post_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- Comments ---

    async fn insert_comment(&self, comment: &PostComment) -> AppResult<PostComment> {
        let inserted = sqlx::query_as::<_, PostComment>(
            r#"
            INSERT INTO post_comments (id, post_id, author_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, post_id, author_id, content, created_at
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(&comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn get_comment(&self, id: Uuid) -> AppResult<Option<PostComment>> {
        let comment = sqlx::query_as::<_, PostComment>(
            "SELECT id, post_id, author_id, content, created_at FROM post_comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_comment_views(
        &self,
        post_id: Uuid,
        viewer: Option<&str>,
    ) -> AppResult<Vec<CommentView>> {
        let comments = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT
                c.id, c.post_id, c.author_id, c.content, c.created_at,
                COALESCE(u.display_name, c.author_id) AS author_name,
                (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS like_count,
                EXISTS (
                    SELECT 1 FROM comment_likes l WHERE l.comment_id = c.id AND l.user_id = $2
                ) AS liked_by_viewer
            FROM post_comments c
            LEFT JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(post_id)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn delete_comment(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM post_comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn like_comment(&self, comment_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO comment_likes (comment_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (comment_id, user_id) DO NOTHING
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlike_comment(&self, comment_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
                .bind(comment_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn comment_like_count(&self, comment_id: Uuid) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1")
                .bind(comment_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // --- Events ---

    async fn insert_event(&self, event: &ClubEvent) -> AppResult<ClubEvent> {
        let inserted = sqlx::query_as::<_, ClubEvent>(
            r#"
            INSERT INTO club_events
                (id, club_id, created_by, title, description, location,
                 starts_at, ends_at, capacity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, club_id, created_by, title, description, location,
                      starts_at, ends_at, capacity, created_at, updated_at
            "#,
        )
        .bind(event.id)
        .bind(event.club_id)
        .bind(&event.created_by)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.capacity)
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn get_event(&self, id: Uuid) -> AppResult<Option<ClubEvent>> {
        let event = sqlx::query_as::<_, ClubEvent>(
            r#"
            SELECT id, club_id, created_by, title, description, location,
                   starts_at, ends_at, capacity, created_at, updated_at
            FROM club_events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_events(
        &self,
        club_id: Uuid,
        ends_after: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ClubEvent>> {
        let events = sqlx::query_as::<_, ClubEvent>(
            r#"
            SELECT id, club_id, created_by, title, description, location,
                   starts_at, ends_at, capacity, created_at, updated_at
            FROM club_events
            WHERE club_id = $1 AND ($2::timestamptz IS NULL OR ends_at > $2)
            ORDER BY starts_at ASC
            "#,
        )
        .bind(club_id)
        .bind(ends_after)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn update_event(&self, event: &ClubEvent) -> AppResult<Option<ClubEvent>> {
        let updated = sqlx::query_as::<_, ClubEvent>(
            r#"
            UPDATE club_events
            SET title = $2, description = $3, location = $4,
                starts_at = $5, ends_at = $6, capacity = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING id, club_id, created_by, title, description, location,
                      starts_at, ends_at, capacity, created_at, updated_at
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.capacity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_event(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM club_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_attendee(&self, event_id: Uuid, user_id: &str) -> AppResult<Option<EventAttendee>> {
        let attendee = sqlx::query_as::<_, EventAttendee>(
            r#"
            SELECT event_id, user_id, status, responded_at
            FROM event_attendees WHERE event_id = $1 AND user_id = $2
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attendee)
    }

    /// upsert_attendee
    ///
    /// Locks the event row for the duration of the transaction, so concurrent RSVPs to
    /// the same event are counted one at a time.
    async fn upsert_attendee(&self, attendee: &EventAttendee) -> AppResult<EventAttendee> {
        let mut tx = self.pool.begin().await?;

        let capacity: Option<i32> =
            sqlx::query_scalar("SELECT capacity FROM club_events WHERE id = $1 FOR UPDATE")
                .bind(attendee.event_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::not_found("event"))?;

        if let (AttendanceStatus::Going, Some(capacity)) = (attendee.status, capacity) {
            let others_going: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM event_attendees
                WHERE event_id = $1 AND user_id <> $2 AND status = 'GOING'
                "#,
            )
            .bind(attendee.event_id)
            .bind(&attendee.user_id)
            .fetch_one(&mut *tx)
            .await?;
            if others_going >= i64::from(capacity) {
                return Err(AppError::conflict("event is at capacity"));
            }
        }

        let stored = sqlx::query_as::<_, EventAttendee>(
            r#"
            INSERT INTO event_attendees (event_id, user_id, status, responded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id, user_id)
            DO UPDATE SET status = EXCLUDED.status, responded_at = EXCLUDED.responded_at
            RETURNING event_id, user_id, status, responded_at
            "#,
        )
        .bind(attendee.event_id)
        .bind(&attendee.user_id)
        .bind(attendee.status.as_str())
        .bind(attendee.responded_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn delete_attendee(&self, event_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM event_attendees WHERE event_id = $1 AND user_id = $2")
                .bind(event_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_attendees(&self, event_id: Uuid) -> AppResult<Vec<AttendeeView>> {
        let attendees = sqlx::query_as::<_, AttendeeView>(
            r#"
            SELECT a.user_id,
                   COALESCE(u.display_name, a.user_id) AS display_name,
                   a.status,
                   a.responded_at
            FROM event_attendees a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.event_id = $1
            ORDER BY a.responded_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attendees)
    }

    async fn attendance_counts(&self, event_id: Uuid) -> AppResult<AttendanceCounts> {
        let (going, interested): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'GOING'),
                COUNT(*) FILTER (WHERE status = 'INTERESTED')
            FROM event_attendees WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(AttendanceCounts { going, interested })
    }

    // --- Challenges ---

    async fn insert_challenge(&self, challenge: &Challenge) -> AppResult<Challenge> {
        let inserted = sqlx::query_as::<_, Challenge>(
            r#"
            INSERT INTO challenges
                (id, club_id, created_by, title, description, metric, unit, ranking,
                 starts_at, ends_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, club_id, created_by, title, description, metric, unit, ranking,
                      starts_at, ends_at, created_at
            "#,
        )
        .bind(challenge.id)
        .bind(challenge.club_id)
        .bind(&challenge.created_by)
        .bind(&challenge.title)
        .bind(&challenge.description)
        .bind(&challenge.metric)
        .bind(&challenge.unit)
        .bind(challenge.ranking.as_str())
        .bind(challenge.starts_at)
        .bind(challenge.ends_at)
        .bind(challenge.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn get_challenge(&self, id: Uuid) -> AppResult<Option<Challenge>> {
        let challenge = sqlx::query_as::<_, Challenge>(
            r#"
            SELECT id, club_id, created_by, title, description, metric, unit, ranking,
                   starts_at, ends_at, created_at
            FROM challenges WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(challenge)
    }

    async fn list_challenges(&self, club_id: Uuid) -> AppResult<Vec<Challenge>> {
        let challenges = sqlx::query_as::<_, Challenge>(
            r#"
            SELECT id, club_id, created_by, title, description, metric, unit, ranking,
                   starts_at, ends_at, created_at
            FROM challenges WHERE club_id = $1
            ORDER BY starts_at DESC
            "#,
        )
        .bind(club_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(challenges)
    }

    async fn delete_challenge(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM challenges WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_participant(
        &self,
        participant: &ChallengeParticipant,
    ) -> AppResult<ChallengeParticipant> {
        let inserted = sqlx::query_as::<_, ChallengeParticipant>(
            r#"
            INSERT INTO challenge_participants (challenge_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            RETURNING challenge_id, user_id, joined_at
            "#,
        )
        .bind(participant.challenge_id)
        .bind(&participant.user_id)
        .bind(participant.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "already participating in this challenge"))?;
        Ok(inserted)
    }

    async fn get_participant(
        &self,
        challenge_id: Uuid,
        user_id: &str,
    ) -> AppResult<Option<ChallengeParticipant>> {
        let participant = sqlx::query_as::<_, ChallengeParticipant>(
            r#"
            SELECT challenge_id, user_id, joined_at
            FROM challenge_participants WHERE challenge_id = $1 AND user_id = $2
            "#,
        )
        .bind(challenge_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn delete_participant(&self, challenge_id: Uuid, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM challenge_participants WHERE challenge_id = $1 AND user_id = $2",
        )
        .bind(challenge_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn participant_count(&self, challenge_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM challenge_participants WHERE challenge_id = $1",
        )
        .bind(challenge_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn insert_entry(&self, entry: &LeaderboardEntry) -> AppResult<LeaderboardEntry> {
        let inserted = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            INSERT INTO leaderboard_entries (id, challenge_id, user_id, value, proof_url, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, challenge_id, user_id, value, proof_url, submitted_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.challenge_id)
        .bind(&entry.user_id)
        .bind(entry.value)
        .bind(&entry.proof_url)
        .bind(entry.submitted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn list_entries(&self, challenge_id: Uuid) -> AppResult<Vec<LeaderboardEntry>> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT id, challenge_id, user_id, value, proof_url, submitted_at
            FROM leaderboard_entries WHERE challenge_id = $1
            ORDER BY submitted_at ASC
            "#,
        )
        .bind(challenge_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    // --- Audit ---

    async fn insert_audit_log(&self, entry: &AuditLog) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, club_id, actor_id, action, target_type, target_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.club_id)
        .bind(&entry.actor_id)
        .bind(entry.action.as_str())
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit_logs(&self, club_id: Option<Uuid>, limit: i64) -> AppResult<Vec<AuditLog>> {
        let entries = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, club_id, actor_id, action, target_type, target_id, metadata, created_at
            FROM audit_logs
            WHERE $1::uuid IS NULL OR club_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(club_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
