//! In-process sliding-window rate limiting.
//!
//! Hits are kept per `(subject, EndpointClass)` as a queue of timestamps. A request is
//! admitted while fewer than `max_requests` hits fall inside the trailing window.
//! State lives in this process only: a restart forgets it and separate instances do
//! not share it.

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, auth::MaybeAuthUser, error::AppError};

/// Rate-limit bucket an operation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Read,
    ClubWrite,
    Post,
    Comment,
    Reaction,
    Upload,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Read => "read",
            EndpointClass::ClubWrite => "club_write",
            EndpointClass::Post => "post",
            EndpointClass::Comment => "comment",
            EndpointClass::Reaction => "reaction",
            EndpointClass::Upload => "upload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitRule {
    pub const fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

/// Per-class limits. Cloned into `AppConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub read: RateLimitRule,
    pub club_write: RateLimitRule,
    pub post: RateLimitRule,
    pub comment: RateLimitRule,
    pub reaction: RateLimitRule,
    pub upload: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            read: RateLimitRule::per_minute(120),
            club_write: RateLimitRule::per_minute(20),
            post: RateLimitRule::per_minute(10),
            comment: RateLimitRule::per_minute(30),
            reaction: RateLimitRule::per_minute(60),
            upload: RateLimitRule::per_minute(20),
        }
    }
}

impl RateLimitConfig {
    pub fn rule(&self, class: EndpointClass) -> RateLimitRule {
        match class {
            EndpointClass::Read => self.read,
            EndpointClass::ClubWrite => self.club_write,
            EndpointClass::Post => self.post,
            EndpointClass::Comment => self.comment,
            EndpointClass::Reaction => self.reaction,
            EndpointClass::Upload => self.upload,
        }
    }
}

/// Returned when a subject has used up its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Duration,
}

impl From<RateLimited> for AppError {
    fn from(limited: RateLimited) -> Self {
        // Round up so a client never retries a hair too early.
        let secs = limited.retry_after.as_secs()
            + u64::from(limited.retry_after.subsec_nanos() > 0);
        AppError::TooManyRequests {
            retry_after_secs: secs.max(1),
        }
    }
}

type Key = (String, EndpointClass);

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<Key, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Records a hit for `subject` now, or rejects it.
    pub fn check(&self, subject: &str, class: EndpointClass) -> Result<(), RateLimited> {
        self.check_at(subject, class, Instant::now())
    }

    /// Clock-injected form of [`check`](Self::check).
    pub fn check_at(
        &self,
        subject: &str,
        class: EndpointClass,
        now: Instant,
    ) -> Result<(), RateLimited> {
        if !self.config.enabled {
            return Ok(());
        }
        let rule = self.config.rule(class);

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let hits = windows
            .entry((subject.to_string(), class))
            .or_default();

        while let Some(&oldest) = hits.front() {
            if now.saturating_duration_since(oldest) >= rule.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= rule.max_requests {
            let retry_after = hits
                .front()
                .map(|&oldest| rule.window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(rule.window);
            tracing::warn!(
                subject,
                class = class.as_str(),
                retry_after_ms = retry_after.as_millis() as u64,
                "rate limit exceeded"
            );
            return Err(RateLimited { retry_after });
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drops hits older than their window and forgets subjects with none left.
    pub fn sweep(&self, now: Instant) {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        windows.retain(|(_, class), hits| {
            let window = self.config.rule(*class).window;
            hits.retain(|&hit| now.saturating_duration_since(hit) < window);
            !hits.is_empty()
        });
    }

    /// Number of tracked (subject, class) keys.
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Rate-limit subject for an authenticated user.
pub fn user_subject(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Rate-limit subject for an anonymous caller: the socket peer address when the server
/// records it, then the first `x-forwarded-for` hop, then `x-real-ip`, else
/// `ip:unknown`.
pub fn ip_subject(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(addr) = peer {
        return format!("ip:{}", addr.ip());
    }
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded.or(real_ip) {
        Some(ip) => format!("ip:{ip}"),
        None => "ip:unknown".to_string(),
    }
}

/// read_rate_limit
///
/// Router-wide middleware drawing every GET (except `/health`) from the `Read`
/// bucket. Authenticated callers are keyed by user id, resolved the same way the
/// `MaybeAuthUser` extractor does; everyone else by client address. Invalid
/// credentials are keyed by address and left for the handler to reject.
pub async fn read_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let subject = match MaybeAuthUser::from_request_parts(&mut parts, &state).await {
        Ok(MaybeAuthUser(Some(user))) => user_subject(&user.id),
        Ok(MaybeAuthUser(None)) | Err(_) => {
            let peer = parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            ip_subject(peer, &parts.headers)
        }
    };
    if let Err(limited) = state.limiter.check(&subject, EndpointClass::Read) {
        return AppError::from(limited).into_response();
    }
    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            post: RateLimitRule {
                max_requests: max,
                window: Duration::from_secs(10),
            },
            ..Default::default()
        })
    }

    #[test]
    fn admits_up_to_max_then_rejects() {
        let limiter = limiter(3);
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(limiter
                .check_at("user:a", EndpointClass::Post, t0 + Duration::from_secs(i))
                .is_ok());
        }
        let err = limiter
            .check_at("user:a", EndpointClass::Post, t0 + Duration::from_secs(4))
            .unwrap_err();
        // Oldest hit at t0 leaves the window at t0+10s.
        assert_eq!(err.retry_after, Duration::from_secs(6));
    }

    #[test]
    fn window_slides() {
        let limiter = limiter(2);
        let t0 = Instant::now();
        limiter.check_at("user:a", EndpointClass::Post, t0).unwrap();
        limiter
            .check_at("user:a", EndpointClass::Post, t0 + Duration::from_secs(5))
            .unwrap();
        assert!(limiter
            .check_at("user:a", EndpointClass::Post, t0 + Duration::from_secs(9))
            .is_err());
        // First hit has aged out; second is still inside the window.
        assert!(limiter
            .check_at("user:a", EndpointClass::Post, t0 + Duration::from_secs(10))
            .is_ok());
        assert!(limiter
            .check_at("user:a", EndpointClass::Post, t0 + Duration::from_secs(11))
            .is_err());
    }

    #[test]
    fn subjects_and_classes_are_independent() {
        let limiter = limiter(1);
        let t0 = Instant::now();
        limiter.check_at("user:a", EndpointClass::Post, t0).unwrap();
        assert!(limiter.check_at("user:b", EndpointClass::Post, t0).is_ok());
        assert!(limiter.check_at("user:a", EndpointClass::Comment, t0).is_ok());
        assert!(limiter.check_at("user:a", EndpointClass::Post, t0).is_err());
    }

    #[test]
    fn disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            post: RateLimitRule::per_minute(0),
            ..Default::default()
        });
        assert!(limiter.check("user:a", EndpointClass::Post).is_ok());
    }

    #[test]
    fn sweep_forgets_idle_subjects() {
        let limiter = limiter(5);
        let t0 = Instant::now();
        limiter.check_at("user:a", EndpointClass::Post, t0).unwrap();
        limiter.check_at("user:b", EndpointClass::Post, t0 + Duration::from_secs(8)).unwrap();
        limiter.sweep(t0 + Duration::from_secs(12));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn ip_subject_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.9".parse().unwrap());
        assert_eq!(ip_subject(None, &headers), "ip:203.0.113.7");
        assert_eq!(ip_subject(None, &HeaderMap::new()), "ip:unknown");
    }

    #[test]
    fn ip_subject_prefers_socket_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        let peer: SocketAddr = "198.51.100.4:52311".parse().unwrap();
        assert_eq!(ip_subject(Some(peer), &headers), "ip:198.51.100.4");
    }

    #[test]
    fn retry_after_rounds_up() {
        let err: AppError = RateLimited {
            retry_after: Duration::from_millis(1500),
        }
        .into();
        assert!(matches!(err, AppError::TooManyRequests { retry_after_secs: 2 }));
    }
}
