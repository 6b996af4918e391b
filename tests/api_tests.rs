//! End-to-end tests over a real TCP listener.

use std::{net::SocketAddr, sync::Arc};

use jsonwebtoken::{EncodingKey, Header, encode};
use redline_api::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    auth::Claims,
    handlers::clubs::ClubDetail,
    models::{Club, JoinClubResponse, JoinOutcome, PostView},
    repository::RepositoryState,
    storage::StorageState,
};
use serde_json::json;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub config: AppConfig,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let config = AppConfig::default();

    let state = AppState::new(repo, storage, config.clone());
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp { address, config }
}

impl TestApp {
    /// A valid HS256 token for `sub`, signed with the app's secret.
    fn token(&self, sub: &str, name: &str) -> String {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: sub.to_string(),
            exp: now + 3600,
            iat: now,
            email: Some(format!("{sub}@example.com")),
            name: Some(name.to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .expect("token encodes")
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(
        response.headers().contains_key("x-request-id"),
        "request id is propagated to the response"
    );
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: serde_json::Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let paths = doc["paths"].as_object().expect("paths object");
    for path in [
        "/clubs",
        "/clubs/{id}/posts",
        "/events/{id}/attendance",
        "/challenges/{id}/leaderboard",
        "/admin/users/{id}/role",
        "/upload/presigned",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

#[tokio::test]
async fn test_club_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = app.token("owner-1", "Ayrton");
    let rider = app.token("rider-1", "Mika");

    // Create
    let response = client
        .post(format!("{}/clubs", app.address))
        .bearer_auth(&owner)
        .json(&json!({ "name": "Sunday Morning Drivers", "description": "Coffee, then canyons" }))
        .send()
        .await
        .expect("post fail");
    assert_eq!(response.status(), 201);
    let club: Club = response.json().await.unwrap();
    assert_eq!(club.slug, "sunday-morning-drivers");
    assert_eq!(club.created_by, "owner-1");

    // Join
    let joined: JoinClubResponse = client
        .post(format!("{}/clubs/{}/join", app.address, club.id))
        .bearer_auth(&rider)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(joined.outcome, JoinOutcome::Joined);

    // Post
    let response = client
        .post(format!("{}/clubs/{}/posts", app.address, club.id))
        .bearer_auth(&rider)
        .json(&json!({ "content": "Who is bringing the drone?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let post: PostView = response.json().await.unwrap();
    assert_eq!(post.author_name, "Mika");

    // Anonymous readers see the public club and its feed.
    let detail: ClubDetail = reqwest::get(format!("{}/clubs/{}", app.address, club.id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail.summary.member_count, 2);
    assert_eq!(detail.summary.viewer_role, None);

    let feed: Vec<PostView> = reqwest::get(format!("{}/clubs/{}/posts", app.address, club.id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].post.id, post.post.id);

    // Delete
    let response = client
        .delete(format!("{}/clubs/{}", app.address, club.id))
        .bearer_auth(&rider)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .delete(format!("{}/clubs/{}", app.address, club.id))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = reqwest::get(format!("{}/clubs/{}", app.address, club.id))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
