//! HTTP handlers, grouped by procedure family.
//!
//! Every handler follows the same shape: throttle (writes only), load a
//! [`ClubAccess`](crate::permissions::ClubAccess) for the club being touched, check
//! capabilities, then call the repository and record an audit event for moderation
//! actions.

use crate::{
    AppState,
    auth::AuthUser,
    error::AppResult,
    rate_limit::{EndpointClass, user_subject},
};

pub mod admin;
pub mod challenges;
pub mod clubs;
pub mod events;
pub mod posts;
pub mod uploads;
pub mod users;

/// Draws one request for `user` from the `class` bucket.
pub(crate) fn throttle(state: &AppState, user: &AuthUser, class: EndpointClass) -> AppResult<()> {
    state.limiter.check(&user_subject(&user.id), class)?;
    Ok(())
}

/// Response for GET /health.
pub async fn health() -> &'static str {
    "ok"
}
