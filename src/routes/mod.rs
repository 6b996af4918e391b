/// Router Module Index
///
/// Splits the API into access-segregated routers. Access control is applied at the
/// router level (layers) and again inside each handler through the extractors and
/// `ClubAccess` checks.

/// Anonymous-capable reads. Throttled per client IP.
pub mod public;

/// Everything that needs a signed-in user: writes, RSVPs, likes, `/me`.
pub mod authenticated;

/// Site administration, nested under `/admin`.
pub mod admin;
