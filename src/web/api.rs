//! Defines the Axum API routes and handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tracing::warn;

use crate::auth::{AuthProvider, DaoAuthProvider, PasswordEncoder};
use crate::config::AuthConfig;
use crate::dao::{ListSelector, TodoDao, TodoError, TodoResult};
use crate::model::{ListSummary, Task};
use crate::web::models::{
    DeleteTaskParams, DoneParams, ListParam, MainInfoResponse, NewListParams, NewTaskParams,
    RenameListRequest, UpdateTaskRequest,
};
use crate::web::rate_limiter::RateLimiter;
use crate::web::session::{self, RedirectWithError, SessionKeys, SessionUser};
use crate::web::token_blacklist::TokenBlacklist;

pub struct AppStateInner {
    pub dao: Arc<dyn TodoDao>,
    pub auth_provider: Box<dyn AuthProvider>,
    pub password_encoder: Arc<dyn PasswordEncoder>,
    pub sessions: SessionKeys,
    pub token_blacklist: TokenBlacklist,
    pub rate_limiter: RateLimiter,
    pub login_failure: RedirectWithError,
    pub register_failure: RedirectWithError,
}
pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Wires the DAO-backed authenticator, session keys and login limiter from `config`.
    pub fn new(
        dao: Arc<dyn TodoDao>,
        password_encoder: Arc<dyn PasswordEncoder>,
        config: &AuthConfig,
    ) -> AppState {
        let auth_provider = Box::new(DaoAuthProvider::new(
            Arc::clone(&dao),
            Arc::clone(&password_encoder),
        ));
        Arc::new(Self {
            dao,
            auth_provider,
            password_encoder,
            sessions: SessionKeys::new(
                config.jwt_secret.as_bytes(),
                Duration::from_secs(config.session_ttl_secs),
            ),
            token_blacklist: TokenBlacklist::new(),
            rate_limiter: RateLimiter::new(
                config.login_max_attempts,
                Duration::from_secs(config.login_window_secs),
            ),
            login_failure: RedirectWithError::new("/login"),
            register_failure: RedirectWithError::new("/register"),
        })
    }

    /// Drops stale login windows and revocations of tokens expired before `now`
    /// (unix seconds); returns how many revocations were dropped.
    pub async fn sweep_expired(&self, now: usize) -> usize {
        self.rate_limiter.cleanup().await;
        self.token_blacklist.prune_expired(now)
    }
}

/// Creates the Axum router with the `/api` endpoints and the public session routes.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/main", get(main_info))
        .route("/lists", get(lists))
        .route("/lists/new", post(new_list))
        .route("/lists/{id}", put(update_list).delete(delete_list))
        .route("/tasks", get(tasks).delete(delete_task))
        .route("/tasks/new", post(new_task))
        .route("/tasks/{id}", put(update_task))
        .route("/tasks/done/{id}", get(set_task_done));

    Router::new()
        .nest("/api", api)
        .merge(session::routes(&state))
        .with_state(state)
}

/// GET /api/main
async fn main_info(
    State(state): State<AppState>,
    session: SessionUser,
) -> TodoResult<Json<MainInfoResponse>> {
    let user = session.username;
    match state.dao.get_lists(&user).await {
        Ok(lists) => Ok(Json(MainInfoResponse {
            user_name: user,
            lists: Some(lists),
            error: None,
        })),
        Err(err @ TodoError::UnknownUser(_)) => Err(err),
        Err(err) => {
            warn!(user = %user, error = %err, "cannot read lists for main view");
            Ok(Json(MainInfoResponse {
                user_name: user,
                lists: None,
                error: Some(err.to_string()),
            }))
        }
    }
}

/// GET /api/lists
async fn lists(
    State(state): State<AppState>,
    session: SessionUser,
) -> TodoResult<Json<Vec<ListSummary>>> {
    Ok(Json(state.dao.get_lists(&session.username).await?))
}

/// POST /api/lists/new?name=
async fn new_list(
    State(state): State<AppState>,
    session: SessionUser,
    Query(params): Query<NewListParams>,
) -> TodoResult<String> {
    state.dao.create_list(&session.username, &params.name).await
}

/// DELETE /api/lists/{id}
async fn delete_list(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<String>,
) -> TodoResult<StatusCode> {
    state.dao.delete_list(&session.username, &id).await?;
    Ok(StatusCode::OK)
}

/// PUT /api/lists/{id}
async fn update_list(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<String>,
    Json(body): Json<RenameListRequest>,
) -> TodoResult<StatusCode> {
    let name = body
        .name
        .ok_or_else(|| TodoError::Validation("Missing new name".to_string()))?;
    state.dao.rename_list(&session.username, &id, &name).await?;
    Ok(StatusCode::OK)
}

/// GET /api/tasks?list=
async fn tasks(
    State(state): State<AppState>,
    session: SessionUser,
    Query(params): Query<ListParam>,
) -> TodoResult<Json<Vec<Task>>> {
    let list = ListSelector::from_param(params.list.as_deref());
    Ok(Json(state.dao.get_tasks(&session.username, &list).await?))
}

/// POST /api/tasks/new?name=&list=
async fn new_task(
    State(state): State<AppState>,
    session: SessionUser,
    Query(params): Query<NewTaskParams>,
) -> TodoResult<String> {
    let list = ListSelector::from_param(params.list.as_deref());
    state
        .dao
        .create_task(&session.username, &list, &params.name)
        .await
}

/// PUT /api/tasks/{id}
async fn update_task(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateTaskRequest>,
) -> TodoResult<StatusCode> {
    let name = body
        .task
        .ok_or_else(|| TodoError::Validation("Missing name".to_string()))?;
    let list = ListSelector::from_param(body.list.as_deref());
    state
        .dao
        .rename_task(&session.username, &list, &id, &name)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /api/tasks/done/{id}?done=&list=
async fn set_task_done(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<String>,
    Query(params): Query<DoneParams>,
) -> TodoResult<StatusCode> {
    let list = ListSelector::from_param(params.list.as_deref());
    state
        .dao
        .set_task_done(&session.username, &list, &id, params.done)
        .await?;
    Ok(StatusCode::OK)
}

/// DELETE /api/tasks?id=&list=
async fn delete_task(
    State(state): State<AppState>,
    session: SessionUser,
    Query(params): Query<DeleteTaskParams>,
) -> TodoResult<StatusCode> {
    let list = ListSelector::from_param(params.list.as_deref());
    state
        .dao
        .delete_task(&session.username, &list, &params.id)
        .await?;
    Ok(StatusCode::OK)
}
