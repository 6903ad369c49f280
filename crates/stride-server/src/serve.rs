//! HTTP API server.
//!
//! All state-changing and user-scoped routes require a bearer session
//! token. Domain errors map onto the HTTP surface here; handlers stay
//! thin and delegate to `stride_core`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use stride_core::auth::{self, TokenConfig};
use stride_core::error::parse_id;
use stride_core::ops::{self, GoalDetail, GoalUpdate, GoalWithHabits, NewGoal};
use stride_core::planner::HabitPlanner;
use stride_core::{OpError, progress, todos};
use stride_db::models::{Category, Goal, GoalStatus, Todo, User};
use stride_db::queries::users;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub planner: Arc<dyn HabitPlanner>,
    pub tokens: TokenConfig,
    pub session_ttl: chrono::Duration,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{err:#}"), "internal server error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }
}

impl From<OpError> for AppError {
    fn from(err: OpError) -> Self {
        match err {
            OpError::PlanningFailed(msg) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: format!("habit planning failed: {msg}"),
            },
            OpError::InvalidIdentifier(raw) => Self::bad_request(format!("invalid id: {raw}")),
            OpError::NotFound(what) => Self::not_found(format!("{what} not found")),
            OpError::Validation(msg) => Self::unprocessable(msg),
            OpError::Storage(err) => Self::internal(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Authentication extractor
// ---------------------------------------------------------------------------

/// The authenticated caller, extracted from the `Authorization: Bearer`
/// header. Rejection is always 401; the body never says which part of
/// the token check failed beyond expiry.
pub struct CurrentUser(pub Uuid);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing authorization header"))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("expected a bearer token"))?;

        let claims = auth::validate_session_token(&state.tokens, token).map_err(|e| match e {
            auth::TokenError::Expired => AppError::unauthorized("session expired"),
            _ => AppError::unauthorized("invalid session token"),
        })?;

        Ok(CurrentUser(claims.user_id))
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: GoalStatus,
}

#[derive(Debug, Deserialize)]
pub struct TodoUpdateRequest {
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/users/me", get(me))
        .route("/api/v1/goals", post(create_goal).get(list_goals))
        .route(
            "/api/v1/goals/{id}",
            get(get_goal).put(update_goal).delete(delete_goal),
        )
        .route("/api/v1/goals/{id}/status", axum::routing::patch(set_goal_status))
        .route("/api/v1/goals/stats/categories", get(category_stats))
        .route("/api/v1/todos", get(list_todos))
        .route("/api/v1/todos/{id}", axum::routing::put(update_todo))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("stride serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stride serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Handlers: health and auth
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn validate_credentials(req: &CredentialsRequest) -> Result<(), AppError> {
    let (local, domain) = req
        .email
        .split_once('@')
        .ok_or_else(|| AppError::unprocessable("email must contain '@'"))?;
    if local.is_empty() || domain.is_empty() {
        return Err(AppError::unprocessable("email is malformed"));
    }
    if req.password.len() < 8 {
        return Err(AppError::unprocessable(
            "password must be at least 8 characters",
        ));
    }
    Ok(())
}

fn issue_token(state: &AppState, user_id: Uuid) -> String {
    auth::generate_session_token(&state.tokens, user_id, state.session_ttl)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    validate_credentials(&req)?;
    let email = req.email.trim().to_lowercase();

    if users::email_exists(&state.pool, &email)
        .await
        .map_err(AppError::internal)?
    {
        return Err(AppError::conflict("email already registered"));
    }

    let password_hash = auth::hash_password(&req.password)
        .map_err(|e| AppError::internal(anyhow::anyhow!(e)))?;
    let user = users::insert_user(&state.pool, &email, &password_hash)
        .await
        .map_err(AppError::internal)?;

    tracing::info!(user_id = %user.id, "user registered");
    let token = issue_token(&state, user.id);
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    let user = users::get_user_by_email(&state.pool, &email)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::unauthorized("incorrect email or password"))?;

    let matches = auth::verify_password(&req.password, &user.password_hash)
        .map_err(|e| AppError::internal(anyhow::anyhow!(e)))?;
    if !matches {
        return Err(AppError::unauthorized("incorrect email or password"));
    }

    let token = issue_token(&state, user.id);
    Ok(Json(AuthResponse { token, user }))
}

async fn me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<User>, AppError> {
    let user = users::get_user(&state.pool, user_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Handlers: goals
// ---------------------------------------------------------------------------

async fn create_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(new_goal): Json<NewGoal>,
) -> Result<(StatusCode, Json<GoalWithHabits>), AppError> {
    let created = ops::create_goal(&state.pool, state.planner.as_ref(), user_id, new_goal).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<GoalDetail>>, AppError> {
    let details = ops::list_goal_details(&state.pool, user_id).await?;
    Ok(Json(details))
}

async fn get_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<GoalDetail>, AppError> {
    let goal_id = parse_id(&id)?;
    let detail = ops::get_goal_detail(&state.pool, user_id, goal_id).await?;
    Ok(Json(detail))
}

async fn update_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<GoalUpdate>,
) -> Result<Json<GoalWithHabits>, AppError> {
    let goal_id = parse_id(&id)?;
    let updated =
        ops::update_goal(&state.pool, state.planner.as_ref(), user_id, goal_id, update).await?;
    Ok(Json(updated))
}

async fn delete_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let goal_id = parse_id(&id)?;
    ops::delete_goal(&state.pool, user_id, goal_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_goal_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Goal>, AppError> {
    let goal_id = parse_id(&id)?;
    let goal = ops::set_goal_status(&state.pool, user_id, goal_id, req.status).await?;
    Ok(Json(goal))
}

async fn category_stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<HashMap<Category, i64>>, AppError> {
    let stats = progress::stats_by_category(&state.pool, user_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Handlers: todos
// ---------------------------------------------------------------------------

/// Materialize and return today's todos for the caller's daily habits.
/// Historical rows whose habit has since been replaced are not part of
/// the day view.
async fn list_todos(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Todo>>, AppError> {
    let today = todos::ensure_today_todos(&state.pool, user_id).await?;
    Ok(Json(today))
}

async fn update_todo(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<TodoUpdateRequest>,
) -> Result<Json<Todo>, AppError> {
    let todo_id = parse_id(&id)?;
    let todo = todos::set_todo_completed(&state.pool, user_id, todo_id, req.completed).await?;
    Ok(Json(todo))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
