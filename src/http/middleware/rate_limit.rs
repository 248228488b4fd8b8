use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::config::rate_limits::IpAction;
use crate::http::AppError;
use crate::AppState;

/// IP-based rate limiting for the unauthenticated credential endpoints
/// (signup, login).
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let action = match classify(request.method(), request.uri().path()) {
        Some(action) => action,
        None => return Ok(next.run(request).await),
    };
    let (limit, window) = state.ip_rate_limits.for_action(action);

    let ip = addr.ip().to_string();
    let rate_limiter = &state.rate_limiter;

    let is_limited = rate_limiter
        .check_ip_rate_limit(&ip, action, limit, window)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check IP rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if is_limited {
        tracing::warn!(ip = ip, action = action.as_str(), "IP rate limit exceeded");
        return Err(AppError::rate_limited(
            "too many attempts from your IP address, please try again later",
        ));
    }

    if let Err(err) = rate_limiter.increment_ip(&ip, action, window).await {
        tracing::warn!(error = ?err, "failed to increment IP rate limit counter");
    }

    Ok(next.run(request).await)
}

// Paths may or may not still carry the API prefix depending on nesting.
fn classify(method: &Method, path: &str) -> Option<IpAction> {
    if *method != Method::POST {
        return None;
    }
    if path.ends_with("/jwt/create/") {
        Some(IpAction::Login)
    } else if path.ends_with("/users/") {
        Some(IpAction::Signup)
    } else {
        None
    }
}
