use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt; // for .oneshot()

use todo_auto::auth::{Argon2PasswordEncoder, PasswordEncoder};
use todo_auto::config::AuthConfig;
use todo_auto::dao::{DocumentTodoDao, MemoryStore, TodoDao};
use todo_auto::web::{AppStateInner, create_router};

async fn app() -> Router {
    let dao: Arc<dyn TodoDao> = Arc::new(DocumentTodoDao::new(MemoryStore::new()));
    let encoder: Arc<dyn PasswordEncoder> = Arc::new(Argon2PasswordEncoder::new());
    let hash = encoder.encode("password").unwrap();
    dao.register_user("admin", &hash).await.unwrap();
    let config = AuthConfig {
        login_max_attempts: 5,
        login_window_secs: 60,
        ..AuthConfig::default()
    };
    create_router(AppStateInner::new(dao, encoder, &config))
}

fn token_req(client_ip: &str, password: &str) -> Request<Body> {
    let login_body = json!({"username": "admin", "password": password});
    Request::builder()
        .method("POST")
        .uri("/auth/token")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client_ip)
        .body(Body::from(login_body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_login_rate_limit() {
    let app = app().await;
    let client_ip = "127.0.0.1";
    // 5 allowed attempts
    for _ in 0..5 {
        let response = app.clone().oneshot(token_req(client_ip, "wrong")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    // 6th attempt should be rate limited, even with the right password
    let response = app.clone().oneshot(token_req(client_ip, "password")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Too many login attempts");

    // Other clients are unaffected
    let response = app.clone().oneshot(token_req("10.1.1.1", "password")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_successful_login_resets_limit() {
    let app = app().await;
    let client_ip = "127.0.0.2";
    for _ in 0..4 {
        let response = app.clone().oneshot(token_req(client_ip, "wrong")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.clone().oneshot(token_req(client_ip, "password")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // The counter starts over
    for _ in 0..5 {
        let response = app.clone().oneshot(token_req(client_ip, "wrong")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_form_login_shares_the_limit() {
    let app = app().await;
    let client_ip = "127.0.0.3";
    let req = || {
        Request::builder()
            .method("POST")
            .uri("/perform_login")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("x-forwarded-for", client_ip)
            .body(Body::from("username=admin&password=wrong"))
            .unwrap()
    };
    for _ in 0..3 {
        let response = app.clone().oneshot(req()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    for _ in 0..2 {
        let response = app.clone().oneshot(token_req(client_ip, "wrong")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.clone().oneshot(req()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
