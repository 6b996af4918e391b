#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use redline_api::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    models::{SiteRole, User},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::Value;
use tower::ServiceExt;

/// Router plus direct handles on the in-memory store, for seeding and assertions.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub state: AppState,
}

pub async fn spawn() -> TestApp {
    spawn_with(AppConfig::default(), Arc::new(MockStorageService::new())).await
}

pub async fn spawn_with(config: AppConfig, storage: StorageState) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(repo.clone() as RepositoryState, storage, config);
    let router = create_router(state.clone());
    TestApp {
        router,
        repo,
        state,
    }
}

impl TestApp {
    /// Inserts a user that the local `x-user-id` bypass can authenticate as.
    pub async fn seed_user(&self, id: &str, role: SiteRole) -> User {
        let user = User {
            id: id.to_string(),
            email: format!("{id}@redline.test"),
            display_name: format!("Driver {id}"),
            avatar_url: None,
            site_role: role,
            created_at: Utc::now(),
        };
        self.repo
            .ensure_user(&user)
            .await
            .expect("seeding a user into the in-memory store")
    }

    /// Sends one request through the full router, authenticating via `x-user-id`.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user {
            builder = builder.header("x-user-id", id);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    /// Creates a club as `owner` and returns its id.
    pub async fn create_club(&self, owner: &str, name: &str, visibility: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/clubs",
                Some(owner),
                Some(serde_json::json!({ "name": name, "visibility": visibility })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create club failed: {body}");
        body["id"].as_str().expect("club id").to_string()
    }

    /// Joins a public club as `user`.
    pub async fn join(&self, club_id: &str, user: &str) {
        let (status, body) = self
            .call(
                Method::POST,
                &format!("/clubs/{club_id}/join"),
                Some(user),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "join failed: {body}");
    }
}
