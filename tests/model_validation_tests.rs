use std::str::FromStr;

use chrono::{Duration, Utc};
use redline_api::{
    error::AppError,
    models::{
        AttendEventRequest, AttendanceStatus, AuditAction, ClubRole, ClubVisibility,
        CreateChallengeRequest, CreateClubRequest, CreateCommentRequest, CreatePostRequest,
        PresignedUrlRequest, RankingOrder, SiteRole, SubmitEntryRequest, UpdateProfileRequest,
        UploadPurpose,
    },
};
use serde_json::json;

fn is_invalid<T: std::fmt::Debug>(result: Result<T, AppError>) -> bool {
    matches!(result, Err(AppError::Validation(_)))
}

// --- Wire format ---

#[test]
fn test_enums_use_screaming_snake_wire_names() {
    assert_eq!(json!(SiteRole::SuperAdmin), json!("SUPER_ADMIN"));
    assert_eq!(json!(ClubRole::Moderator), json!("MODERATOR"));
    assert_eq!(json!(RankingOrder::LowerIsBetter), json!("LOWER_IS_BETTER"));
    assert_eq!(json!(AuditAction::SiteRoleChanged), json!("SITE_ROLE_CHANGED"));

    assert_eq!(ClubVisibility::from_str("PRIVATE").unwrap(), ClubVisibility::Private);
    assert_eq!(AttendanceStatus::Interested.to_string(), "INTERESTED");

    let err = ClubRole::from_str("OWNER").unwrap_err();
    assert_eq!(err.value, "OWNER");
}

#[test]
fn test_request_defaults() {
    let club: CreateClubRequest = serde_json::from_value(json!({ "name": "Rotary Club" })).unwrap();
    assert_eq!(club.visibility, ClubVisibility::Public);
    assert_eq!(club.description, "");

    let rsvp: AttendEventRequest = serde_json::from_value(json!({})).unwrap();
    assert_eq!(rsvp.status, AttendanceStatus::Going);

    let start = Utc::now();
    let challenge: CreateChallengeRequest = serde_json::from_value(json!({
        "title": "Dyno day",
        "metric": "Power",
        "unit": "whp",
        "starts_at": start,
        "ends_at": start + Duration::days(1),
    }))
    .unwrap();
    assert_eq!(challenge.ranking, RankingOrder::HigherIsBetter);

    let unknown: Result<CreateClubRequest, _> =
        serde_json::from_value(json!({ "name": "Rotary Club", "visibility": "SECRET" }));
    assert!(unknown.is_err());
}

// --- Validation ---

#[test]
fn test_club_name_rules() {
    let named = |name: &str| CreateClubRequest {
        name: name.to_string(),
        ..Default::default()
    };
    assert!(named("Boxer Engines").validate().is_ok());
    assert!(is_invalid(named("  ab  ").validate()));
    assert!(is_invalid(named("-- -- --").validate()), "slug would be empty");
    assert!(is_invalid(named(&"x".repeat(81)).validate()));

    let long_description = CreateClubRequest {
        description: "d".repeat(2001),
        ..named("Boxer Engines")
    };
    assert!(is_invalid(long_description.validate()));
}

#[test]
fn test_content_lengths() {
    let post = |content: &str| CreatePostRequest {
        content: content.to_string(),
        media_url: None,
    };
    assert!(post("Cars and coffee this Sunday").validate().is_ok());
    assert!(is_invalid(post("   ").validate()));
    assert!(is_invalid(post(&"p".repeat(5001)).validate()));

    let comment = CreateCommentRequest {
        content: "c".repeat(2001),
    };
    assert!(is_invalid(comment.validate()));
}

#[test]
fn test_profile_updates() {
    let ok = UpdateProfileRequest {
        display_name: Some("Keiichi".to_string()),
        avatar_url: Some("https://cdn.example.com/a.png".to_string()),
    };
    assert!(ok.validate().is_ok());
    assert!(UpdateProfileRequest::default().validate().is_ok());

    let bad_url = UpdateProfileRequest {
        avatar_url: Some("javascript:alert(1)".to_string()),
        ..Default::default()
    };
    assert!(is_invalid(bad_url.validate()));

    let blank = UpdateProfileRequest {
        display_name: Some(" ".to_string()),
        ..Default::default()
    };
    assert!(is_invalid(blank.validate()));
}

#[test]
fn test_challenge_requests() {
    let start = Utc::now();
    let request = CreateChallengeRequest {
        title: "Skidpad".to_string(),
        metric: "Lateral g".to_string(),
        unit: "g".to_string(),
        starts_at: start,
        ends_at: start,
        ..Default::default()
    };
    assert!(is_invalid(request.validate()), "window must not be empty");

    let entry = |value: f64| SubmitEntryRequest {
        value,
        proof_url: None,
    };
    assert!(entry(0.0).validate().is_ok());
    assert!(entry(1.04).validate().is_ok());
    assert!(is_invalid(entry(-0.5).validate()));
    assert!(is_invalid(entry(f64::NAN).validate()));
    assert!(is_invalid(entry(f64::INFINITY).validate()));
}

#[test]
fn test_upload_requests() {
    let request = |filename: &str, file_type: &str| PresignedUrlRequest {
        filename: filename.to_string(),
        file_type: file_type.to_string(),
        purpose: UploadPurpose::Club,
    };
    assert!(request("banner.webp", "image/webp").validate().is_ok());
    assert!(is_invalid(request("notes.pdf", "application/pdf").validate()));

    assert_eq!(request("Banner.WEBP", "image/webp").extension(), "webp");
    assert_eq!(request("archive.tar.gz", "image/png").extension(), "gz");
    assert_eq!(request("no-extension", "image/png").extension(), "bin");
    assert_eq!(UploadPurpose::Avatar.folder(), "avatars");
}
