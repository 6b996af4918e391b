//! Repository contract tests.
//!
//! Every scenario runs against the in-memory store. The same scenarios run against
//! Postgres when `DATABASE_URL` points at a disposable database:
//! `cargo test --test repository_integration_tests -- --ignored`.

use std::sync::Arc;

use chrono::{Duration, SubsecRound, Utc};
use redline_api::{
    error::AppError,
    models::{
        AttendanceStatus, Challenge, ChallengeParticipant, Club, ClubEvent, ClubMember, ClubPost,
        ClubRole, ClubVisibility, EventAttendee, FeedCursor, LeaderboardEntry, PostComment, SiteRole,
        User, slugify,
    },
    repository::{InMemoryRepository, PostgresRepository, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run integration tests");

    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");

    PostgresRepository::new(pool)
}

/// Unique per run so Postgres scenarios never collide with earlier rows.
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..8])
}

async fn user(repo: &dyn Repository, prefix: &str) -> User {
    let id = unique(prefix);
    repo.ensure_user(&User {
        email: format!("{id}@redline.test"),
        display_name: format!("Driver {prefix}"),
        id,
        avatar_url: None,
        site_role: SiteRole::User,
        created_at: Utc::now(),
    })
    .await
    .expect("insert user")
}

async fn club(repo: &dyn Repository, owner: &User) -> Club {
    let name = unique("Midnight Club");
    let now = Utc::now();
    repo.create_club(&Club {
        id: Uuid::new_v4(),
        slug: slugify(&name),
        name,
        description: "Late night runs".to_string(),
        visibility: ClubVisibility::Public,
        location: None,
        image_url: None,
        created_by: owner.id.clone(),
        created_at: now,
        updated_at: now,
    })
    .await
    .expect("insert club")
}

fn post(club: &Club, author: &User, content: &str, age: Duration) -> ClubPost {
    let created_at = Utc::now() - age;
    ClubPost {
        id: Uuid::new_v4(),
        club_id: club.id,
        author_id: author.id.clone(),
        content: content.to_string(),
        media_url: None,
        is_pinned: false,
        created_at,
        updated_at: created_at,
    }
}

// --- Scenarios ---

async fn users_are_provisioned_once(repo: &dyn Repository) {
    let first = user(repo, "kei").await;
    let again = repo
        .ensure_user(&User {
            display_name: "Someone Else".to_string(),
            site_role: SiteRole::SuperAdmin,
            ..first.clone()
        })
        .await
        .unwrap();
    assert_eq!(again.display_name, first.display_name, "existing row wins");
    assert_eq!(again.site_role, SiteRole::User);

    let promoted = repo
        .set_site_role(&first.id, SiteRole::Admin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promoted.site_role, SiteRole::Admin);
    assert!(repo.set_site_role("nobody", SiteRole::Admin).await.unwrap().is_none());

    let names = repo.display_names(&[first.id.clone()]).await.unwrap();
    assert_eq!(names[&first.id], "Driver kei");
}

async fn club_creation_seeds_the_creator(repo: &dyn Repository) {
    let owner = user(repo, "owner").await;
    let created = club(repo, &owner).await;

    let member = repo.get_member(created.id, &owner.id).await.unwrap().unwrap();
    assert_eq!(member.role, ClubRole::Admin);

    let same_slug = Club {
        id: Uuid::new_v4(),
        ..created.clone()
    };
    assert!(matches!(
        repo.create_club(&same_slug).await,
        Err(AppError::Conflict(_))
    ));

    let rider = user(repo, "rider").await;
    let membership = ClubMember {
        club_id: created.id,
        user_id: rider.id.clone(),
        role: ClubRole::Member,
        joined_at: Utc::now(),
    };
    repo.insert_member(&membership).await.unwrap();
    assert!(matches!(
        repo.insert_member(&membership).await,
        Err(AppError::Conflict(_))
    ));

    let counts = repo.member_counts(&[created.id]).await.unwrap();
    assert_eq!(counts[&created.id], 2);

    assert!(repo.delete_club(created.id).await.unwrap());
    assert!(repo.get_member(created.id, &rider.id).await.unwrap().is_none());
    assert!(!repo.delete_club(created.id).await.unwrap());
}

async fn feed_orders_pinned_then_newest(repo: &dyn Repository) {
    let author = user(repo, "author").await;
    let fan = user(repo, "fan").await;
    let created = club(repo, &author).await;

    let oldest = repo
        .insert_post(&post(&created, &author, "oldest", Duration::minutes(30)))
        .await
        .unwrap();
    let middle = repo
        .insert_post(&post(&created, &author, "middle", Duration::minutes(20)))
        .await
        .unwrap();
    let newest = repo
        .insert_post(&post(&created, &author, "newest", Duration::minutes(10)))
        .await
        .unwrap();
    repo.set_post_pinned(oldest.id, true).await.unwrap();

    assert!(repo.like_post(middle.id, &fan.id).await.unwrap());
    assert!(!repo.like_post(middle.id, &fan.id).await.unwrap(), "likes are idempotent");
    repo.insert_comment(&PostComment {
        id: Uuid::new_v4(),
        post_id: middle.id,
        author_id: fan.id.clone(),
        content: "Clean build".to_string(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let feed = repo
        .list_post_views(created.id, Some(fan.id.as_str()), None, 10)
        .await
        .unwrap();
    let order: Vec<&str> = feed.iter().map(|v| v.post.content.as_str()).collect();
    assert_eq!(order, ["oldest", "newest", "middle"]);
    assert_eq!(feed[2].like_count, 1);
    assert_eq!(feed[2].comment_count, 1);
    assert!(feed[2].liked_by_viewer);
    assert_eq!(feed[2].author_name, "Driver author");

    let page = repo
        .list_post_views(
            created.id,
            None,
            Some(FeedCursor {
                created_at: newest.created_at,
                id: Some(newest.id),
            }),
            10,
        )
        .await
        .unwrap();
    let order: Vec<&str> = page.iter().map(|v| v.post.content.as_str()).collect();
    assert_eq!(order, ["middle"], "pinned posts only lead the first page");

    assert!(repo.delete_post(middle.id).await.unwrap());
    assert_eq!(repo.post_like_count(middle.id).await.unwrap(), 0);
    assert!(
        repo.list_comment_views(middle.id, None)
            .await
            .unwrap()
            .is_empty()
    );
}

async fn feed_cursor_reaches_every_post(repo: &dyn Repository) {
    let author = user(repo, "walker").await;
    let created = club(repo, &author).await;

    let pinned = repo
        .insert_post(&post(&created, &author, "pinned", Duration::minutes(40)))
        .await
        .unwrap();
    repo.set_post_pinned(pinned.id, true).await.unwrap();
    let same_instant = (Utc::now() - Duration::minutes(20)).trunc_subsecs(6);
    for content in ["twin a", "twin b"] {
        let mut twin = post(&created, &author, content, Duration::zero());
        twin.created_at = same_instant;
        twin.updated_at = same_instant;
        repo.insert_post(&twin).await.unwrap();
    }
    repo.insert_post(&post(&created, &author, "newest", Duration::minutes(10)))
        .await
        .unwrap();

    let mut seen = Vec::new();
    let mut page = repo.list_post_views(created.id, None, None, 1).await.unwrap();
    assert_eq!(page.len(), 2, "pinned posts do not count towards the limit");
    while let Some(last) = page.last() {
        let cursor = FeedCursor {
            created_at: last.post.created_at,
            id: Some(last.post.id),
        };
        seen.extend(page.iter().map(|v| v.post.content.clone()));
        page = repo
            .list_post_views(created.id, None, Some(cursor), 1)
            .await
            .unwrap();
    }

    assert_eq!(seen.len(), 4, "{seen:?}");
    assert_eq!(seen[0], "pinned");
    assert_eq!(seen[1], "newest");
    let mut twins = seen[2..].to_vec();
    twins.sort();
    assert_eq!(twins, ["twin a", "twin b"]);
}

async fn attendance_is_upserted(repo: &dyn Repository) {
    let host = user(repo, "host").await;
    let guest = user(repo, "guest").await;
    let created = club(repo, &host).await;
    let start = Utc::now() + Duration::days(1);

    let past = repo
        .insert_event(&ClubEvent {
            id: Uuid::new_v4(),
            club_id: created.id,
            created_by: host.id.clone(),
            title: "Old meet".to_string(),
            starts_at: Utc::now() - Duration::days(3),
            ends_at: Utc::now() - Duration::days(2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        })
        .await
        .unwrap();
    let event = repo
        .insert_event(&ClubEvent {
            id: Uuid::new_v4(),
            club_id: created.id,
            created_by: host.id.clone(),
            title: "Canyon run".to_string(),
            starts_at: start,
            ends_at: start + Duration::hours(3),
            capacity: Some(10),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        })
        .await
        .unwrap();

    let upcoming = repo.list_events(created.id, Some(Utc::now())).await.unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, event.id);
    let all = repo.list_events(created.id, None).await.unwrap();
    assert_eq!(all.first().map(|e| e.id), Some(past.id));

    for status in [AttendanceStatus::Interested, AttendanceStatus::Going] {
        repo.upsert_attendee(&EventAttendee {
            event_id: event.id,
            user_id: guest.id.clone(),
            status,
            responded_at: Utc::now(),
        })
        .await
        .unwrap();
    }
    let counts = repo.attendance_counts(event.id).await.unwrap();
    assert_eq!((counts.going, counts.interested), (1, 0));

    let attendees = repo.list_attendees(event.id).await.unwrap();
    assert_eq!(attendees.len(), 1);
    assert_eq!(attendees[0].display_name, "Driver guest");

    assert!(repo.delete_attendee(event.id, &guest.id).await.unwrap());
    assert!(!repo.delete_attendee(event.id, &guest.id).await.unwrap());
}

async fn capacity_is_enforced_on_write(repo: &dyn Repository) {
    let host = user(repo, "pitboss").await;
    let first = user(repo, "first").await;
    let second = user(repo, "second").await;
    let created = club(repo, &host).await;
    let start = Utc::now() + Duration::days(2);
    let event = repo
        .insert_event(&ClubEvent {
            id: Uuid::new_v4(),
            club_id: created.id,
            created_by: host.id.clone(),
            title: "Single-seat shakedown".to_string(),
            starts_at: start,
            ends_at: start + Duration::hours(1),
            capacity: Some(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        })
        .await
        .unwrap();
    let rsvp = |who: &User, status| EventAttendee {
        event_id: event.id,
        user_id: who.id.clone(),
        status,
        responded_at: Utc::now(),
    };

    repo.upsert_attendee(&rsvp(&first, AttendanceStatus::Going))
        .await
        .unwrap();
    assert!(matches!(
        repo.upsert_attendee(&rsvp(&second, AttendanceStatus::Going)).await,
        Err(AppError::Conflict(_))
    ));
    repo.upsert_attendee(&rsvp(&first, AttendanceStatus::Going))
        .await
        .expect("a confirmed attendee keeps their place");
    repo.upsert_attendee(&rsvp(&second, AttendanceStatus::Interested))
        .await
        .unwrap();

    let counts = repo.attendance_counts(event.id).await.unwrap();
    assert_eq!((counts.going, counts.interested), (1, 1));

    let missing = EventAttendee {
        event_id: Uuid::new_v4(),
        ..rsvp(&first, AttendanceStatus::Going)
    };
    assert!(matches!(
        repo.upsert_attendee(&missing).await,
        Err(AppError::NotFound(_))
    ));
}

async fn challenge_entries_are_kept(repo: &dyn Repository) {
    let owner = user(repo, "marshal").await;
    let racer = user(repo, "racer").await;
    let created = club(repo, &owner).await;
    let now = Utc::now();

    let challenge = repo
        .insert_challenge(&Challenge {
            id: Uuid::new_v4(),
            club_id: created.id,
            created_by: owner.id.clone(),
            title: "Hill climb".to_string(),
            metric: "Time".to_string(),
            unit: "s".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::days(1),
            created_at: now,
            ..Default::default()
        })
        .await
        .unwrap();

    let participant = ChallengeParticipant {
        challenge_id: challenge.id,
        user_id: racer.id.clone(),
        joined_at: now,
    };
    repo.insert_participant(&participant).await.unwrap();
    assert!(matches!(
        repo.insert_participant(&participant).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(repo.participant_count(challenge.id).await.unwrap(), 1);

    for value in [61.2, 59.8] {
        repo.insert_entry(&LeaderboardEntry {
            id: Uuid::new_v4(),
            challenge_id: challenge.id,
            user_id: racer.id.clone(),
            value,
            proof_url: None,
            submitted_at: Utc::now(),
        })
        .await
        .unwrap();
    }

    assert!(repo.delete_participant(challenge.id, &racer.id).await.unwrap());
    assert_eq!(repo.list_entries(challenge.id).await.unwrap().len(), 2);

    assert!(repo.delete_challenge(challenge.id).await.unwrap());
    assert!(repo.list_entries(challenge.id).await.unwrap().is_empty());
}

// --- In-memory runs ---

#[tokio::test]
async fn test_memory_users() {
    users_are_provisioned_once(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_clubs() {
    club_creation_seeds_the_creator(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_feed() {
    feed_orders_pinned_then_newest(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_feed_cursor() {
    feed_cursor_reaches_every_post(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_attendance() {
    attendance_is_upserted(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_capacity() {
    capacity_is_enforced_on_write(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_concurrent_rsvps_respect_capacity() {
    let repo = Arc::new(InMemoryRepository::new());
    let host = user(repo.as_ref(), "host").await;
    let created = club(repo.as_ref(), &host).await;
    let start = Utc::now() + Duration::days(1);
    let event = repo
        .insert_event(&ClubEvent {
            id: Uuid::new_v4(),
            club_id: created.id,
            created_by: host.id.clone(),
            title: "Track day".to_string(),
            starts_at: start,
            ends_at: start + Duration::hours(8),
            capacity: Some(3),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        })
        .await
        .unwrap();

    let event_id = event.id;
    let mut tasks = Vec::new();
    for n in 0..20 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            repo.upsert_attendee(&EventAttendee {
                event_id,
                user_id: format!("rider-{n}"),
                status: AttendanceStatus::Going,
                responded_at: Utc::now(),
            })
            .await
            .is_ok()
        }));
    }
    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 3);
    assert_eq!(repo.attendance_counts(event_id).await.unwrap().going, 3);
}

#[tokio::test]
async fn test_memory_challenges() {
    challenge_entries_are_kept(&InMemoryRepository::new()).await;
}

// --- Postgres runs ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_users() {
    users_are_provisioned_once(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_clubs() {
    club_creation_seeds_the_creator(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_feed() {
    feed_orders_pinned_then_newest(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_feed_cursor() {
    feed_cursor_reaches_every_post(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_attendance() {
    attendance_is_upserted(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_capacity() {
    capacity_is_enforced_on_write(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_challenges() {
    challenge_entries_are_kept(&postgres().await).await;
}
