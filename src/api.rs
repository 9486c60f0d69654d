use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use diesel::SqliteConnection;
use serde::Deserialize;
use serde_json::json;
use std::env;

use crate::model::{AdjustmentLogEntry, Game, Player};
use crate::{
    adjust_score, adjustment_log, create_admin_session, fetch_all_players, fetch_leaderboard,
    register_player, resolve_player, update_game_ids, validate_admin_token, DbPool, GameIds,
    Registration, StoreError,
};

/// Name of the admin session cookie.
const ADMIN_COOKIE: &str = "admin_token";

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown game \"{0}\"")]
    UnknownGame(String),
    #[error("Invalid PIN")]
    InvalidPin,
    #[error("Admin PIN not set")]
    PinNotConfigured,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::PlayerNotFound) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) | ApiError::UnknownGame(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidPin | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PinNotConfigured | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Runs a store closure on a pooled connection inside spawn_blocking, since
/// Diesel's SQLite connections are synchronous.
async fn with_conn<T, F>(pool: DbPool, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| ApiError::Internal(e.to_string()))?;
        f(&mut conn).map_err(ApiError::from)
    })
    .await;
    match result {
        Ok(inner) => inner,
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

/// Pulls a named cookie out of the request headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(value.to_string());
        }
    }
    None
}

/// Strips non-digits from a submitted PIN; anything that doesn't normalize to
/// exactly 4 digits never matches.
pub fn normalize_pin(pin: &str) -> Option<String> {
    let digits: String = pin.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        Some(digits)
    } else {
        None
    }
}

/// The operator PIN from the environment. Must normalize to 4 digits.
fn configured_pin() -> Result<String, ApiError> {
    let raw = env::var("ADMIN_PIN").map_err(|_| ApiError::PinNotConfigured)?;
    normalize_pin(&raw).ok_or(ApiError::PinNotConfigured)
}

/// Returns Ok only when the request carries a valid admin session cookie.
async fn check_admin(pool: DbPool, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = cookie_value(headers, ADMIN_COOKIE).ok_or(ApiError::Unauthorized)?;
    let valid = with_conn(pool, move |conn| validate_admin_token(conn, &token)).await?;
    if valid {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn register(
    State(state): State<AppState>,
    Json(reg): Json<Registration>,
) -> Result<(StatusCode, Json<Player>), ApiError> {
    let player = with_conn(state.pool, move |conn| register_player(conn, &reg)).await?;
    tracing::info!(username = %player.username, "player registered");
    Ok((StatusCode::CREATED, Json(player)))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    game: Option<String>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Missing game defaults to Smash Karts, matching the original tabs.
    let game = match query.game {
        Some(raw) => Game::parse(&raw).ok_or(ApiError::UnknownGame(raw))?,
        None => Game::Smash,
    };
    let rows = with_conn(state.pool, move |conn| fetch_leaderboard(conn, game)).await?;
    Ok(Json(json!({
        "game": game,
        "title": game.label(),
        "players": rows,
    })))
}

async fn all_players(State(state): State<AppState>) -> Result<Json<Vec<Player>>, ApiError> {
    let rows = with_conn(state.pool, fetch_all_players).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    pin: String,
}

async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let expected = configured_pin()?;
    let entered = normalize_pin(&req.pin).ok_or(ApiError::InvalidPin)?;
    if entered != expected {
        tracing::warn!("admin login rejected");
        return Err(ApiError::InvalidPin);
    }

    let token = with_conn(state.pool, create_admin_session).await?;
    let cookie = format!(
        "{}={}; Max-Age=86400; Path=/; HttpOnly; SameSite=Strict",
        ADMIN_COOKIE, token
    );
    tracing::info!("admin session created");
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "ok": true }))))
}

async fn admin_logout() -> impl IntoResponse {
    let cookie = format!(
        "{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict",
        ADMIN_COOKIE
    );
    ([(header::SET_COOKIE, cookie)], Json(json!({ "ok": true })))
}

async fn admin_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let admin = match cookie_value(&headers, ADMIN_COOKIE) {
        Some(token) => {
            with_conn(state.pool, move |conn| validate_admin_token(conn, &token)).await?
        }
        None => false,
    };
    Ok(Json(json!({ "admin": admin })))
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    query: String,
}

async fn admin_player(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ResolveQuery>,
) -> Result<Json<Player>, ApiError> {
    check_admin(state.pool.clone(), &headers).await?;
    let player = with_conn(state.pool, move |conn| resolve_player(conn, &q.query)).await?;
    Ok(Json(player))
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    query: String,
    game: Game,
    delta: i32,
}

async fn admin_score(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_admin(state.pool.clone(), &headers).await?;
    let (player, adjustment) = with_conn(state.pool, move |conn| {
        adjust_score(conn, &req.query, req.game, req.delta)
    })
    .await?;
    tracing::info!(
        username = %player.username,
        game = %adjustment.game,
        delta = adjustment.delta,
        "score adjusted"
    );
    Ok(Json(json!({ "player": player, "adjustment": adjustment })))
}

#[derive(Debug, Deserialize)]
struct IdsRequest {
    query: String,
    #[serde(flatten)]
    ids: GameIds,
}

async fn admin_ids(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IdsRequest>,
) -> Result<Json<Player>, ApiError> {
    check_admin(state.pool.clone(), &headers).await?;
    let player = with_conn(state.pool, move |conn| {
        update_game_ids(conn, &req.query, &req.ids)
    })
    .await?;
    tracing::info!(username = %player.username, "player IDs updated");
    Ok(Json(player))
}

async fn admin_adjustments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AdjustmentLogEntry>>, ApiError> {
    check_admin(state.pool.clone(), &headers).await?;
    let log = with_conn(state.pool, adjustment_log).await?;
    Ok(Json(log))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/register", post(register))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/players", get(all_players))
        .route("/api/admin/login", post(admin_login))
        .route("/api/admin/logout", post(admin_logout))
        .route("/api/admin/session", get(admin_session))
        .route("/api/admin/player", get(admin_player))
        .route("/api/admin/score", post(admin_score))
        .route("/api/admin/ids", put(admin_ids))
        .route("/api/admin/adjustments", get(admin_adjustments))
        .with_state(state)
}
