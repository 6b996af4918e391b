mod common;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request, StatusCode, header},
};
use redline_api::{
    AppConfig, MockStorageService,
    models::SiteRole,
    rate_limit::{RateLimitConfig, RateLimitRule},
};
use serde_json::json;
use tower::ServiceExt;

async fn seeded() -> common::TestApp {
    let app = common::spawn().await;
    app.seed_user("root", SiteRole::SuperAdmin).await;
    app.seed_user("ops", SiteRole::Admin).await;
    app.seed_user("driver", SiteRole::User).await;
    app
}

// --- Site administration ---

#[tokio::test]
async fn test_stats_require_site_admin() {
    let app = seeded().await;
    app.create_club("driver", "Track Day Regulars", "PUBLIC").await;

    let (status, body) = app.call(Method::GET, "/admin/stats", Some("driver"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app.call(Method::GET, "/admin/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, stats) = app.call(Method::GET, "/admin/stats", Some("ops"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_users"], 3);
    assert_eq!(stats["total_clubs"], 1);
    assert_eq!(stats["total_posts"], 0);
}

#[tokio::test]
async fn test_only_super_admin_assigns_site_roles() {
    let app = seeded().await;
    let promote = Some(json!({ "role": "ADMIN" }));

    let (status, _) = app
        .call(Method::PUT, "/admin/users/driver/role", Some("ops"), promote.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "site ADMIN cannot grant roles");

    let (status, _) = app
        .call(Method::PUT, "/admin/users/root/role", Some("root"), Some(json!({ "role": "USER" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "own role is locked");

    let (status, _) = app
        .call(Method::PUT, "/admin/users/ghost/role", Some("root"), promote.clone())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, user) = app
        .call(Method::PUT, "/admin/users/driver/role", Some("root"), promote)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["site_role"], "ADMIN");

    // The promotion takes effect on the next request.
    let (status, _) = app.call(Method::GET, "/admin/stats", Some("driver"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, logs) = app
        .call(Method::GET, "/admin/audit-log", Some("ops"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entry = &logs[0];
    assert_eq!(entry["action"], "SITE_ROLE_CHANGED");
    assert_eq!(entry["actor_id"], "root");
    assert_eq!(entry["target_id"], "driver");
    assert_eq!(entry["club_id"], serde_json::Value::Null);
    assert_eq!(entry["metadata"]["from"], "USER");
    assert_eq!(entry["metadata"]["to"], "ADMIN");
}

// --- Rate limiting ---

fn tight_limits() -> AppConfig {
    AppConfig {
        rate_limit: RateLimitConfig {
            read: RateLimitRule {
                max_requests: 2,
                window: Duration::from_secs(60),
            },
            club_write: RateLimitRule {
                max_requests: 2,
                window: Duration::from_secs(60),
            },
            ..RateLimitConfig::default()
        },
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn test_writes_are_throttled_per_user() {
    let app = common::spawn_with(tight_limits(), Arc::new(MockStorageService::new())).await;
    app.seed_user("driver", SiteRole::User).await;
    app.seed_user("other", SiteRole::User).await;

    for name in ["Driver One", "Driver Two"] {
        let (status, _) = app
            .call(Method::PATCH, "/me", Some("driver"), Some(json!({ "display_name": name })))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/me")
        .header("x-user-id", "driver")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "display_name": "Driver Three" }).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    // Buckets are per user.
    let (status, _) = app
        .call(Method::PATCH, "/me", Some("other"), Some(json!({ "display_name": "Someone" })))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reads_are_throttled_except_health() {
    let app = common::spawn_with(tight_limits(), Arc::new(MockStorageService::new())).await;

    for _ in 0..2 {
        let (status, _) = app.call(Method::GET, "/clubs", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.call(Method::GET, "/clubs", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");

    for _ in 0..5 {
        let (status, _) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_reads_are_throttled_per_user() {
    let app = common::spawn_with(tight_limits(), Arc::new(MockStorageService::new())).await;
    app.seed_user("a", SiteRole::User).await;
    app.seed_user("b", SiteRole::User).await;

    for _ in 0..2 {
        let (status, _) = app.call(Method::GET, "/me", Some("a"), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = app.call(Method::GET, "/me", Some("a"), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, body) = app.call(Method::GET, "/me", Some("b"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], "b");

    // Anonymous reads draw from their own address bucket.
    let (status, _) = app.call(Method::GET, "/clubs", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_reads_are_keyed_by_peer_address() {
    let app = common::spawn_with(tight_limits(), Arc::new(MockStorageService::new())).await;

    let get_from = |peer: &str| {
        let mut request = Request::builder()
            .method(Method::GET)
            .uri("/clubs")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        app.router.clone().oneshot(request)
    };

    for _ in 0..2 {
        assert_eq!(get_from("198.51.100.1:4000").await.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(
        get_from("198.51.100.1:4001").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS,
        "ports do not split the bucket"
    );
    assert_eq!(get_from("198.51.100.2:4000").await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_limiter_admits_everything() {
    let mut config = tight_limits();
    config.rate_limit.enabled = false;
    let app = common::spawn_with(config, Arc::new(MockStorageService::new())).await;

    for _ in 0..5 {
        let (status, _) = app.call(Method::GET, "/clubs", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
