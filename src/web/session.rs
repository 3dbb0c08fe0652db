//! Session tokens, the authenticated-user extractor and the public
//! login/logout/registration endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, Form, FromRequestParts, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{AuthError, AuthenticatedIdentity};
use crate::web::api::AppState;
use crate::web::error::unauthorized;
use crate::web::login_rate_limit::{ClientIp, login_rate_limit_middleware};
use crate::web::models::{AuthRequest, AuthResponse, CredentialsForm};

pub const SESSION_COOKIE: &str = "TODO_SESSION";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<String>,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

/// Signs and verifies HS256 session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity: &AuthenticatedIdentity) -> jsonwebtoken::errors::Result<String> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: identity.username.clone(),
            roles: identity
                .authorities
                .iter()
                .map(|authority| authority.as_str().to_string())
                .collect(),
            iat: now,
            exp: now + self.ttl.as_secs() as usize,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// Redirects to `path?error=<url-encoded message>`.
#[derive(Debug, Clone)]
pub struct RedirectWithError {
    path: String,
}

impl RedirectWithError {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn location(&self, message: &str) -> String {
        format!("{}?error={}", self.path, urlencoding::encode(message))
    }

    pub fn redirect(&self, message: &str) -> Response {
        Redirect::to(&self.location(message)).into_response()
    }
}

/// The user behind a valid, unrevoked session token.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub username: String,
    pub claims: Claims,
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .or_else(|| {
            headers
                .typed_get::<Cookie>()
                .and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_string))
        })
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(unauthorized)?;
        let claims = state.sessions.verify(&token).map_err(|err| {
            debug!(error = %err, "rejected session token");
            unauthorized()
        })?;
        if state.token_blacklist.is_revoked(&claims.jti) {
            debug!(user = %claims.sub, "rejected revoked session token");
            return Err(unauthorized());
        }
        Ok(Self {
            username: claims.sub.clone(),
            claims,
        })
    }
}

fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    )
}

fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

async fn authenticate(
    state: &AppState,
    username: &str,
    password: Option<&str>,
) -> Result<AuthenticatedIdentity, AuthError> {
    match state.auth_provider.authenticate(username, password).await {
        Ok(Some(identity)) => {
            info!(user = username, "login succeeded");
            Ok(identity)
        }
        Ok(None) => {
            info!(user = username, "login without credentials");
            Err(AuthError::BadCredentials)
        }
        Err(err) => {
            warn!(user = username, error = %err, "login failed");
            Err(err)
        }
    }
}

/// POST /perform_login
async fn perform_login(
    State(state): State<AppState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let identity = match authenticate(&state, &form.username, form.password.as_deref()).await {
        Ok(identity) => identity,
        Err(err) => return state.login_failure.redirect(&err.to_string()),
    };
    let token = match state.sessions.issue(&identity) {
        Ok(token) => token,
        Err(err) => return state.login_failure.redirect(&err.to_string()),
    };
    state.rate_limiter.reset(ip).await;
    (
        [(SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Redirect::to("/"),
    )
        .into_response()
}

/// POST /auth/token
async fn issue_token(
    State(state): State<AppState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(payload): Json<AuthRequest>,
) -> Response {
    let password = payload.password.as_deref();
    let identity = match authenticate(&state, &payload.username, password).await {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };
    match state.sessions.issue(&identity) {
        Ok(token) => {
            state.rate_limiter.reset(ip).await;
            (StatusCode::OK, Json(AuthResponse { token })).into_response()
        }
        Err(err) => AuthError::InternalAuthFailure(err.to_string()).into_response(),
    }
}

/// GET|POST /perform_logout
async fn perform_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let claims = session_token(&headers).and_then(|token| state.sessions.verify(&token).ok());
    if let Some(claims) = claims {
        state.token_blacklist.revoke(&claims.jti, claims.exp);
        info!(user = %claims.sub, "logged out");
    }
    (
        [(SET_COOKIE, expired_session_cookie())],
        Redirect::to("/login?logout"),
    )
        .into_response()
}

/// POST /perform_register
async fn perform_register(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let Some(password) = form.password.filter(|p| !p.is_empty()) else {
        return state.register_failure.redirect("Missing password");
    };
    let encoder = Arc::clone(&state.password_encoder);
    let hash = match tokio::task::spawn_blocking(move || encoder.encode(&password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => return state.register_failure.redirect(&err.to_string()),
        Err(err) => return state.register_failure.redirect(&err.to_string()),
    };
    match state.dao.register_user(&form.username, &hash).await {
        Ok(()) => Redirect::to("/login?registered").into_response(),
        Err(err) => {
            warn!(user = %form.username, error = %err, "registration failed");
            state.register_failure.redirect(&err.to_string())
        }
    }
}

/// Public session routes; the login endpoints sit behind the per-IP rate limiter.
pub fn routes(state: &AppState) -> Router<AppState> {
    let limited =
        || axum::middleware::from_fn_with_state(state.clone(), login_rate_limit_middleware);
    Router::new()
        .route("/perform_login", post(perform_login).route_layer(limited()))
        .route("/auth/token", post(issue_token).route_layer(limited()))
        .route("/perform_logout", get(perform_logout).post(perform_logout))
        .route("/perform_register", post(perform_register))
}
