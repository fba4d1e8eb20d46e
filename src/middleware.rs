//! HTTP integration for axum.
//!
//! [`protect`] wraps a router with the rate limiter, the
//! Content-Security-Policy header and request tracing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::error;

use crate::manager::SecurityManager;
use crate::security::{RateDecision, CONTENT_SECURITY_POLICY};

/// Header carrying the deny reason on 429 responses.
pub static RATE_LIMIT_REASON: HeaderName = HeaderName::from_static("x-ratelimit-reason");

/// Header carrying the per-minute limit on allowed responses.
pub static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// Rate limit middleware keyed by the peer IP.
///
/// Requires the server to be started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn rate_limit_middleware(
    State(manager): State<Arc<SecurityManager>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = addr.ip().to_string();

    match manager.check_rate_limit(&identifier) {
        Ok(RateDecision::Allowed) => {
            let limit = manager.rate_limiter().config().max_per_minute;
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(RATE_LIMIT_LIMIT.clone(), HeaderValue::from(limit));
            response
        }
        Ok(RateDecision::Denied(reason)) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.",
            )
                .into_response();
            response.headers_mut().insert(
                RATE_LIMIT_REASON.clone(),
                HeaderValue::from_static(reason.as_str()),
            );
            response
        }
        Err(e) => {
            // Fail open: a poisoned limiter must not take the service down
            error!(ip = %identifier, "rate limiter unavailable: {}", e);
            next.run(request).await
        }
    }
}

/// Layer that adds the Content-Security-Policy unless a handler set one.
pub fn content_security_policy_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    )
}

/// Wrap `router` with rate limiting, CSP and tracing.
pub fn protect(router: Router, manager: Arc<SecurityManager>) -> Router {
    router
        .layer(middleware::from_fn_with_state(manager, rate_limit_middleware))
        .layer(content_security_policy_layer())
        .layer(TraceLayer::new_for_http())
}
