use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::web::api::AppState;
use crate::web::error::json_error;

/// Address of the caller, stored in request extensions by the login rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| IpAddr::from_str(s.trim()).ok())
        })
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// Middleware for rate limiting login attempts per IP.
pub async fn login_rate_limit_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if !state.rate_limiter.check_and_increment(ip).await {
        warn!(%ip, "login rate limit exceeded");
        return json_error("Too many login attempts", StatusCode::TOO_MANY_REQUESTS);
    }
    req.extensions_mut().insert(ClientIp(ip));
    next.run(req).await
}
