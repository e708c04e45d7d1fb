//! Caller identifier extraction from request headers.
//!
//! The identifier segments quota per caller. It is a heuristic, not a
//! security boundary: forwarded-address headers are attacker-controllable
//! unless a trusted proxy strips them, so the limiter deters abuse rather
//! than authenticating anyone.

use axum::http::HeaderMap;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Shared bucket for callers with no usable address header.
///
/// Pooling all unidentifiable callers into one quota trades individual
/// fairness for simplicity.
pub const FALLBACK_IDENTIFIER: &str = "unidentified";

/// Derive the quota identifier for a request.
///
/// Prefers the first entry of `x-forwarded-for`, then `x-real-ip`, then the
/// shared fallback bucket.
pub fn client_identifier(headers: &HeaderMap) -> String {
    parse_x_forwarded_for(headers)
        .or_else(|| parse_x_real_ip(headers))
        .unwrap_or_else(|| FALLBACK_IDENTIFIER.to_string())
}

fn parse_x_forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .split(',')
                .map(str::trim)
                .find(|part| !part.is_empty())
                .map(str::to_string)
        })
}

fn parse_x_real_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_REAL_IP)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
