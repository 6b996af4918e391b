use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    audit::AuditEvent,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{AuditAction, AuditLog, AuditLogQuery, SetSiteRoleRequest, SiteRole, SiteStats, User},
};

fn require_site_admin(user: &AuthUser) -> AppResult<()> {
    if user.site_role.is_site_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("site administrator role required"))
    }
}

/// get_site_stats
///
/// Dashboard counters. Restricted to site ADMIN and SUPER_ADMIN.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Statistics retrieved successfully", body = SiteStats),
        (status = 403, description = "Forbidden", body = crate::error::ErrorBody)
    )
)]
pub async fn get_site_stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<SiteStats>> {
    require_site_admin(&user)?;
    let stats = state.repo.get_stats().await?;
    Ok(Json(stats))
}

/// set_user_role
///
/// SUPER_ADMIN only. Changing your own role is refused so the last super admin
/// cannot lock everyone out.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = String, Path, description = "User ID")),
    request_body = SetSiteRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 403, description = "Forbidden", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody)
    )
)]
pub async fn set_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(target_id): Path<String>,
    Json(payload): Json<SetSiteRoleRequest>,
) -> AppResult<Json<User>> {
    if user.site_role != SiteRole::SuperAdmin {
        return Err(AppError::forbidden("super administrator role required"));
    }
    if target_id == user.id {
        return Err(AppError::bad_request("you cannot change your own site role"));
    }

    let previous = state
        .repo
        .get_user(&target_id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    let updated = state
        .repo
        .set_site_role(&target_id, payload.role)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

    state
        .audit
        .record(
            AuditEvent::site(&user.id, AuditAction::SiteRoleChanged, "user", &target_id)
                .with_metadata(serde_json::json!({
                    "from": previous.site_role,
                    "to": updated.site_role,
                })),
        )
        .await;

    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/admin/audit-log",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Global audit log, newest first", body = [AuditLog]),
        (status = 403, description = "Forbidden", body = crate::error::ErrorBody)
    )
)]
pub async fn admin_audit_log(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<Json<Vec<AuditLog>>> {
    require_site_admin(&user)?;
    let logs = state
        .repo
        .list_audit_logs(None, query.effective_limit())
        .await?;
    Ok(Json(logs))
}
