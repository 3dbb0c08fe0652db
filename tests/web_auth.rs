//! Integration tests for session login, token issuance, logout and registration

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt; // for .collect().await
use serde_json::json;
use tower::util::ServiceExt; // for `oneshot`

use todo_auto::auth::{Argon2PasswordEncoder, AuthenticatedIdentity, Authority, PasswordEncoder};
use todo_auto::config::AuthConfig;
use todo_auto::dao::{DocumentTodoDao, MemoryStore, TodoDao};
use todo_auto::web::{AppState, AppStateInner, create_router};

async fn test_state() -> AppState {
    let dao: Arc<dyn TodoDao> = Arc::new(DocumentTodoDao::new(MemoryStore::new()));
    let encoder: Arc<dyn PasswordEncoder> = Arc::new(Argon2PasswordEncoder::new());
    let hash = encoder.encode("secret").unwrap();
    dao.register_user("alice", &hash).await.unwrap();
    AppStateInner::new(dao, encoder, &AuthConfig::default())
}

async fn test_app() -> Router {
    create_router(test_state().await)
}

fn token_request(username: &str, password: &str) -> Request<Body> {
    let payload = json!({ "username": username, "password": password });
    Request::builder()
        .method("POST")
        .uri("/auth/token")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn login_token(app: &Router, username: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(token_request(username, password))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    json["token"].as_str().unwrap().to_string()
}

fn location(response: &axum::response::Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn test_token_success() {
    let app = test_app().await;
    let response = app.oneshot(token_request("alice", "secret")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json.get("token").is_some());
}

#[tokio::test]
async fn test_token_wrong_password() {
    let app = test_app().await;
    let response = app.oneshot(token_request("alice", "guess")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Bad credentials");
}

#[tokio::test]
async fn test_token_unknown_user() {
    let app = test_app().await;
    let response = app.oneshot(token_request("bob", "secret")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Unknown user: bob");
}

#[tokio::test]
async fn test_form_login_sets_session_cookie() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(form_request("/perform_login", "username=alice&password=secret"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("TODO_SESSION="));
    let session = cookie.split(';').next().unwrap().to_string();

    let request = Request::builder()
        .uri("/api/main")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["userName"], "alice");
}

#[tokio::test]
async fn test_form_login_failure_redirects_with_error() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(form_request("/perform_login", "username=alice&password=guess"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=Bad%20credentials");
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let response = app
        .oneshot(form_request("/perform_login", "username=alice"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/login?error=Bad%20credentials");
}

#[tokio::test]
async fn test_api_requires_session() {
    let app = test_app().await;
    let request = Request::builder().uri("/api/lists").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(bearer_get("/api/lists", "invalidtoken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_grants_api_access() {
    let app = test_app().await;
    let token = login_token(&app, "alice", "secret").await;
    let response = app.oneshot(bearer_get("/api/main", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["userName"], "alice");
    assert_eq!(json["lists"], json!([]));
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_session_of_vanished_user_is_unauthorized() {
    let state = test_state().await;
    let token = state
        .sessions
        .issue(&AuthenticatedIdentity {
            username: "ghost".to_string(),
            authorities: vec![Authority::User],
            credential_hash: String::new(),
        })
        .unwrap();
    let app = create_router(state);
    for uri in ["/api/main", "/api/lists", "/api/tasks"] {
        let response = app.clone().oneshot(bearer_get(uri, &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = test_app().await;
    let token = login_token(&app, "alice", "secret").await;

    let response = app
        .clone()
        .oneshot(bearer_get("/perform_logout", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?logout");
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let response = app.oneshot(bearer_get("/api/main", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_login() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(form_request("/perform_register", "username=bob&password=pw"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?registered");

    let token = login_token(&app, "bob", "pw").await;
    let response = app.oneshot(bearer_get("/api/lists", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_existing_user_redirects_with_error() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(form_request("/perform_register", "username=alice&password=other"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/register?error=User%20already%20exists%3A%20alice"
    );

    // The original password still works.
    login_token(&app, "alice", "secret").await;

    let response = app
        .oneshot(form_request("/perform_register", "username=carol"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/register?error=Missing%20password");
}

#[tokio::test]
async fn test_sweep_drops_only_expired_revocations() {
    let state = test_state().await;
    state.token_blacklist.revoke("expired", 10);
    state.token_blacklist.revoke("live", 1_000);
    assert_eq!(state.sweep_expired(500).await, 1);
    assert!(!state.token_blacklist.is_revoked("expired"));
    assert!(state.token_blacklist.is_revoked("live"));
}
