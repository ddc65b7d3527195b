//! HTTP adapter over [`AuthService`].
//!
//! Every failure is rendered as `{"error": <message>, "code": <CODE>}`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tessera_auth::{AuthError, AuthService, ErrorKind, LoginInput, RegisterInput};
use tessera_core::models::user::PublicUser;
use tessera_core::repository::{RefreshTokenRepository, UserRepository};
use tracing::error;

struct AppState<U: UserRepository, R: RefreshTokenRepository> {
    auth: Arc<AuthService<U, R>>,
    started_at: Instant,
}

type SharedState<U, R> = Arc<AppState<U, R>>;

/// Build the router for the given service.
pub fn router<U, R>(auth: Arc<AuthService<U, R>>) -> Router
where
    U: UserRepository + 'static,
    R: RefreshTokenRepository + 'static,
{
    let state = Arc::new(AppState {
        auth,
        started_at: Instant::now(),
    });

    Router::new()
        .route("/auth/health", get(health::<U, R>))
        .route("/auth/health/live", get(live))
        .route("/auth/health/ready", get(ready))
        .route("/auth/register", post(register::<U, R>))
        .route("/auth/login", post(login::<U, R>))
        .route("/auth/refresh", post(refresh::<U, R>))
        .route("/auth/logout", post(logout::<U, R>))
        .route("/auth/me", get(me::<U, R>))
        .fallback(not_found)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error response carrying an outcome code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn with_status(status: StatusCode, err: &AuthError) -> Self {
        Self {
            status,
            code: err.code(),
            message: err.public_message(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::FORBIDDEN,
            ErrorKind::Authentication => match &err {
                AuthError::TokenInvalid(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            ErrorKind::Internal => {
                error!(error = %err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::with_status(status, &err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message, "code": self.code });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    user: PublicUser,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    message: &'static str,
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<PublicUser>,
}

/// Unreadable bodies are treated as empty so the engine reports the
/// missing fields itself.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    body.map(|Json(inner)| inner).unwrap_or_default()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .split_once(' ')
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health<U, R>(State(state): State<SharedState<U, R>>) -> impl IntoResponse
where
    U: UserRepository,
    R: RefreshTokenRepository,
{
    Json(json!({
        "status": "healthy",
        "service": "tessera",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}

async fn live() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

async fn ready() -> impl IntoResponse {
    Json(json!({ "status": "ready" }))
}

async fn register<U, R>(
    State(state): State<SharedState<U, R>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
{
    let req = body_or_default(body);
    let user = state
        .auth
        .register(RegisterInput {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: Some("User registered successfully"),
            user,
        }),
    ))
}

async fn login<U, R>(
    State(state): State<SharedState<U, R>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
{
    let req = body_or_default(body);
    let out = state
        .auth
        .login(LoginInput {
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok(Json(TokenResponse {
        message: "Login successful",
        access_token: out.access_token,
        refresh_token: out.refresh_token,
        expires_in: out.expires_in,
        user: Some(out.user),
    }))
}

async fn refresh<U, R>(
    State(state): State<SharedState<U, R>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
{
    let req = body_or_default(body);
    let out = state
        .auth
        .refresh(req.refresh_token.as_deref())
        .await
        .map_err(|err| match err {
            AuthError::TokenMissing => ApiError::with_status(StatusCode::BAD_REQUEST, &err),
            other => other.into(),
        })?;

    Ok(Json(TokenResponse {
        message: "Token refreshed successfully",
        access_token: out.access_token,
        refresh_token: out.refresh_token,
        expires_in: out.expires_in,
        user: None,
    }))
}

async fn logout<U, R>(
    State(state): State<SharedState<U, R>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
{
    let req = body_or_default(body);
    state.auth.logout(req.refresh_token.as_deref()).await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully",
    }))
}

async fn me<U, R>(
    State(state): State<SharedState<U, R>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError>
where
    U: UserRepository,
    R: RefreshTokenRepository,
{
    let claims = state.auth.verify(bearer_token(&headers))?;
    let user = state
        .auth
        .current_user(&claims)
        .await
        .map_err(|err| match err {
            AuthError::UserNotFound => ApiError::with_status(StatusCode::NOT_FOUND, &err),
            other => other.into(),
        })?;

    Ok(Json(UserResponse {
        message: None,
        user,
    }))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": format!("route {method} {} not found", uri.path()),
            "code": "NOT_FOUND",
        })),
    )
}
