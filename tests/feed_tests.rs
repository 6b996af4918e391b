mod common;

use axum::http::{Method, StatusCode};
use redline_api::models::SiteRole;
use serde_json::{Value, json};

/// A public club owned by "owner" with "alice" and "bob" as members and "mod" as
/// moderator. "stranger" exists but never joins.
async fn club_with_members() -> (common::TestApp, String) {
    let app = common::spawn().await;
    for id in ["owner", "alice", "bob", "mod", "stranger"] {
        app.seed_user(id, SiteRole::User).await;
    }
    let club = app.create_club("owner", "Nürburgring Regulars", "PUBLIC").await;
    for id in ["alice", "bob", "mod"] {
        app.join(&club, id).await;
    }
    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/clubs/{club}/members/mod"),
            Some("owner"),
            Some(json!({ "role": "MODERATOR" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    (app, club)
}

async fn post(app: &common::TestApp, club: &str, author: &str, content: &str) -> Value {
    let (status, body) = app
        .call(
            Method::POST,
            &format!("/clubs/{club}/posts"),
            Some(author),
            Some(json!({ "content": content })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn test_create_post_returns_view() {
    let (app, club) = club_with_members().await;

    let body = post(&app, &club, "alice", "  Anyone up for a dawn run?  ").await;

    assert_eq!(body["post"]["content"], "Anyone up for a dawn run?");
    assert_eq!(body["author_name"], "Driver alice");
    assert_eq!(body["like_count"], 0);
    assert_eq!(body["comment_count"], 0);
    assert_eq!(body["liked_by_viewer"], false);
}

#[tokio::test]
async fn test_non_member_cannot_post() {
    let (app, club) = club_with_members().await;

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/clubs/{club}/posts"),
            Some("stranger"),
            Some(json!({ "content": "hello?" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/clubs/{club}/posts"),
            Some("alice"),
            Some(json!({ "content": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "blank content");
}

#[tokio::test]
async fn test_like_twice_conflicts_and_counts_are_returned() {
    let (app, club) = club_with_members().await;
    let id = post(&app, &club, "alice", "New coilovers installed")
        .await["post"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/posts/{id}/like");

    let (status, body) = app.call(Method::POST, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "liked": true, "like_count": 1 }));

    let (status, body) = app.call(Method::POST, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (_, body) = app.call(Method::POST, &uri, Some("alice"), None).await;
    assert_eq!(body["like_count"], 2);

    let (status, body) = app
        .call(Method::GET, &format!("/posts/{id}"), Some("bob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked_by_viewer"], true);
    assert_eq!(body["like_count"], 2);

    let (status, body) = app.call(Method::DELETE, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "liked": false, "like_count": 1 }));

    let (status, _) = app.call(Method::DELETE, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::POST, &uri, Some("stranger"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "reacting needs membership");
}

#[tokio::test]
async fn test_pinned_posts_lead_the_feed() {
    let (app, club) = club_with_members().await;
    let first = post(&app, &club, "alice", "first").await;
    let first_id = first["post"]["id"].as_str().unwrap().to_string();
    post(&app, &club, "bob", "second").await;
    post(&app, &club, "bob", "third").await;

    let (status, _) = app
        .call(Method::POST, &format!("/posts/{first_id}/pin"), Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "authors cannot pin");

    let (status, body) = app
        .call(Method::POST, &format!("/posts/{first_id}/pin"), Some("mod"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_pinned"], true);

    let (status, body) = app
        .call(Method::GET, &format!("/clubs/{club}/posts"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["post"]["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["first", "third", "second"]);
}

#[tokio::test]
async fn test_feed_pagination_with_cursor() {
    let (app, club) = club_with_members().await;
    for n in 0..5 {
        post(&app, &club, "alice", &format!("post {n}")).await;
    }

    let (_, page) = app
        .call(Method::GET, &format!("/clubs/{club}/posts?limit=2"), None, None)
        .await;
    let page = page.as_array().unwrap().clone();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["post"]["content"], "post 4");

    let cursor = page[1]["post"]["created_at"].as_str().unwrap();
    let cursor = urlencode(cursor);
    let (status, next) = app
        .call(
            Method::GET,
            &format!("/clubs/{club}/posts?limit=2&before={cursor}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{next}");
    let next = next.as_array().unwrap();
    assert_eq!(next.len(), 2);
    assert_eq!(next[0]["post"]["content"], "post 2");
}

#[tokio::test]
async fn test_pinned_oldest_post_does_not_hide_newer_posts() {
    let (app, club) = club_with_members().await;
    let oldest = post(&app, &club, "alice", "oldest").await;
    let oldest_id = oldest["post"]["id"].as_str().unwrap().to_string();
    for n in 1..=3 {
        post(&app, &club, "bob", &format!("newer {n}")).await;
    }
    let (status, _) = app
        .call(Method::POST, &format!("/posts/{oldest_id}/pin"), Some("mod"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, first) = app
        .call(Method::GET, &format!("/clubs/{club}/posts?limit=1"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut page = first.as_array().unwrap().clone();
    let contents: Vec<&str> = page
        .iter()
        .map(|p| p["post"]["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["oldest", "newer 3"]);

    let mut seen: Vec<String> = Vec::new();
    while let Some(last) = page.last() {
        let before = urlencode(last["post"]["created_at"].as_str().unwrap());
        let before_id = last["post"]["id"].as_str().unwrap().to_string();
        seen.extend(
            page.iter()
                .map(|p| p["post"]["content"].as_str().unwrap().to_string()),
        );
        let (status, next) = app
            .call(
                Method::GET,
                &format!("/clubs/{club}/posts?limit=1&before={before}&before_id={before_id}"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{next}");
        page = next.as_array().unwrap().clone();
    }

    assert_eq!(seen, ["oldest", "newer 3", "newer 2", "newer 1"]);
}

fn urlencode(value: &str) -> String {
    value.replace('+', "%2B").replace(':', "%3A")
}

#[tokio::test]
async fn test_only_author_edits_post() {
    let (app, club) = club_with_members().await;
    let id = post(&app, &club, "alice", "typo'd").await["post"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/posts/{id}"),
            Some("mod"),
            Some(json!({ "content": "moderated" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/posts/{id}"),
            Some("alice"),
            Some(json!({ "content": "fixed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "fixed");
}

#[tokio::test]
async fn test_comments_and_moderated_deletes() {
    let (app, club) = club_with_members().await;
    let id = post(&app, &club, "alice", "Show your engine bays").await["post"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, comment) = app
        .call(
            Method::POST,
            &format!("/posts/{id}/comments"),
            Some("bob"),
            Some(json!({ "content": "S54, freshly detailed" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{comment}");
    assert_eq!(comment["author_name"], "Driver bob");
    let comment_id = comment["comment"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/comments/{comment_id}/like"),
            Some("alice"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["like_count"], 1);

    let (_, comments) = app
        .call(Method::GET, &format!("/posts/{id}/comments"), Some("alice"), None)
        .await;
    assert_eq!(comments[0]["like_count"], 1);
    assert_eq!(comments[0]["liked_by_viewer"], true);

    let (_, view) = app
        .call(Method::GET, &format!("/posts/{id}"), None, None)
        .await;
    assert_eq!(view["comment_count"], 1);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/comments/{comment_id}"),
            Some("alice"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "post author is not a moderator");

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/comments/{comment_id}"),
            Some("mod"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, log) = app
        .call(
            Method::GET,
            &format!("/clubs/{club}/audit-log"),
            Some("owner"),
            None,
        )
        .await;
    assert_eq!(log[0]["action"], "COMMENT_DELETED");
    assert_eq!(log[0]["actor_id"], "mod");

    // Own post: deleting is not a moderation action.
    let (status, _) = app
        .call(Method::DELETE, &format!("/posts/{id}"), Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, log) = app
        .call(
            Method::GET,
            &format!("/clubs/{club}/audit-log"),
            Some("owner"),
            None,
        )
        .await;
    assert_eq!(log[0]["action"], "COMMENT_DELETED");

    let (status, _) = app
        .call(Method::GET, &format!("/posts/{id}/comments"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
