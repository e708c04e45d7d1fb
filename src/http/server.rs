//! HTTP server exposing the quota decision endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::Result;
use crate::identity::client_identifier;
use crate::ratelimit::{LimiterRegistry, LimiterScope};

use super::gate::{apply_quota_headers, rejection_response};

/// HTTP server for the quota decision service.
///
/// Deployments that cannot embed the gate middleware in-process call
/// `POST /v1/check/{scope}` before doing work; the answer carries the same
/// headers and status the middleware would have produced.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The shared limiter registry
    registry: Arc<LimiterRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server over a limiter registry.
    pub fn new(addr: SocketAddr, registry: Arc<LimiterRegistry>) -> Self {
        Self { addr, registry }
    }

    /// Build the service router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(health))
            .route("/v1/check/{scope}", post(check_scope))
            .with_state(Arc::clone(&self.registry))
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server runs until the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting HTTP server for quota decisions");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Answer a quota decision for one named limiter.
async fn check_scope(
    State(registry): State<Arc<LimiterRegistry>>,
    Path(scope): Path<String>,
    headers: axum::http::HeaderMap,
) -> Response {
    let Ok(scope) = scope.parse::<LimiterScope>() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown limiter scope '{}'", scope) })),
        )
            .into_response();
    };

    let identifier = client_identifier(&headers);
    let decision = registry.get(scope).check(&identifier);

    if !decision.allowed {
        return rejection_response(&decision);
    }

    let mut response = (
        StatusCode::OK,
        Json(json!({
            "allowed": true,
            "limit": decision.limit,
            "remaining": decision.remaining,
            "reset": decision.reset_rfc3339(),
        })),
    )
        .into_response();
    apply_quota_headers(&mut response, &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LimitConfig, LimitsConfig};
    use crate::http::gate::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let limits = LimitsConfig {
            auth: LimitConfig {
                window_ms: 900_000,
                max_requests: 2,
            },
            ..LimitsConfig::default()
        };
        HttpServer::new(
            "127.0.0.1:8080".parse().unwrap(),
            Arc::new(LimiterRegistry::new(&limits)),
        )
    }

    fn check(scope: &str, identifier: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/v1/check/{}", scope))
            .header("x-forwarded-for", identifier)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = server().router();
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_check_reports_quota() {
        let app = server().router();
        let response = app.oneshot(check("auth", "203.0.113.5")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(X_RATELIMIT_LIMIT).unwrap(), "2");
        assert_eq!(response.headers().get(X_RATELIMIT_REMAINING).unwrap(), "1");
    }

    #[tokio::test]
    async fn test_check_rejects_past_ceiling() {
        let app = server().router();
        for _ in 0..2 {
            let response = app.clone().oneshot(check("auth", "203.0.113.5")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(check("auth", "203.0.113.5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unknown_scope_is_not_found() {
        let app = server().router();
        let response = app.oneshot(check("metrics", "203.0.113.5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
