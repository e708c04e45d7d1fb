//! Request gating middleware.
//!
//! Every rate-limited route follows the same sequence: derive the caller
//! identifier, consult the named limiter, and short-circuit with a 429 before
//! any expensive work (database calls, outbound email) happens downstream.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use crate::identity::client_identifier;
use crate::ratelimit::{Decision, LimiterRegistry, LimiterScope};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Middleware state binding a registry to one limiter purpose.
///
/// Wire it onto a router with `middleware::from_fn_with_state`:
///
/// ```ignore
/// let gate = QuotaGate::new(registry, LimiterScope::Auth);
/// let app = Router::new()
///     .route("/login", post(login))
///     .layer(middleware::from_fn_with_state(gate, enforce_quota));
/// ```
#[derive(Clone)]
pub struct QuotaGate {
    registry: Arc<LimiterRegistry>,
    scope: LimiterScope,
}

impl QuotaGate {
    /// Bind a registry and a limiter purpose.
    pub fn new(registry: Arc<LimiterRegistry>, scope: LimiterScope) -> Self {
        Self { registry, scope }
    }
}

/// Check quota for the request and reject with 429 when exhausted.
///
/// Admitted requests pass through untouched; rejected requests never reach
/// the inner handler.
pub async fn enforce_quota(
    State(gate): State<QuotaGate>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(request.headers());
    let decision = gate.registry.get(gate.scope).check(&identifier);

    if !decision.allowed {
        debug!(
            scope = %gate.scope,
            identifier = %identifier,
            reset = %decision.reset_rfc3339(),
            "Request rejected by quota gate"
        );
        return rejection_response(&decision);
    }

    next.run(request).await
}

/// Attach the quota telemetry headers to a response.
pub fn apply_quota_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert(X_RATELIMIT_LIMIT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert(X_RATELIMIT_REMAINING, value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_rfc3339()) {
        headers.insert(X_RATELIMIT_RESET, value);
    }
}

/// Build the 429 response for a rejecting decision.
///
/// Carries machine-readable quota headers and a human-readable retry hint;
/// nothing about internal state leaks into the body.
pub fn rejection_response(decision: &Decision) -> Response {
    let reset = decision.reset_rfc3339();
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests",
            "message": format!("Rate limit exceeded. Try again after {}.", reset),
        })),
    )
        .into_response();
    apply_quota_headers(&mut response, decision);
    response
}
