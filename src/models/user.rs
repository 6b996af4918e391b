use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use super::check_text;
use crate::error::{AppError, AppResult};

text_enum! {
    /// SiteRole
    ///
    /// Global role. `ADMIN` and `SUPER_ADMIN` override every club-level check;
    /// only `SUPER_ADMIN` may change other users' site roles.
    pub enum SiteRole {
        User => "USER",
        Admin => "ADMIN",
        SuperAdmin => "SUPER_ADMIN",
    }
}

impl SiteRole {
    pub fn is_site_admin(&self) -> bool {
        matches!(self, SiteRole::Admin | SiteRole::SuperAdmin)
    }
}

impl Default for SiteRole {
    fn default() -> Self {
        SiteRole::User
    }
}

/// User
///
/// Local mirror of an identity-provider account (`users` table). The id is the
/// provider's opaque subject string, so it is kept as `String` rather than `Uuid`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub site_role: SiteRole,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UpdateProfileRequest
///
/// Partial update of the caller's own profile (PATCH /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.display_name {
            check_text("display_name", name, 1, 60)?;
        }
        if let Some(url) = &self.avatar_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(AppError::validation("avatar_url must be an http(s) URL"));
            }
        }
        Ok(())
    }
}

/// SetSiteRoleRequest
///
/// Body of PUT /admin/users/{id}/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetSiteRoleRequest {
    pub role: SiteRole,
}

/// SiteStats
///
/// Output schema for the site administration dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq, Eq)]
#[ts(export)]
pub struct SiteStats {
    pub total_users: i64,
    pub total_clubs: i64,
    pub total_posts: i64,
    pub total_events: i64,
    pub total_challenges: i64,
}
