use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use serde_json::json;

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

// -- Handlers --

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    let display_name = req.display_name.trim().to_string();

    if username.is_empty() || email.is_empty() || req.password.is_empty() || display_name.is_empty()
    {
        return Err(AppError::BadRequest("All fields are required".into()));
    }

    let conn = state.db.get()?;

    let username_taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    if username_taken {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let email_taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    if email_taken {
        return Err(AppError::Conflict("Email already exists".into()));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    conn.execute(
        "INSERT INTO users (username, email, password_hash, display_name, provider)
         VALUES (?1, ?2, ?3, ?4, 'credentials')",
        params![username, email, password_hash, display_name],
    )?;
    let user_id = conn.last_insert_rowid();

    tracing::info!(user_id, "new user signed up");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "userId": user_id })),
    )
        .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let row: Option<(i64, Option<String>, String, String, Option<String>)> = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT id, password_hash, email, display_name, avatar
             FROM users WHERE username = ?1 AND is_active = 1",
            params![req.username],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )
        .optional()?
    };

    let (user_id, password_hash, email, display_name, avatar) =
        row.ok_or(AppError::Unauthorized)?;
    let password_hash = password_hash.ok_or(AppError::Unauthorized)?;

    let valid = bcrypt::verify(&req.password, &password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
    if !valid {
        return Err(AppError::Unauthorized);
    }

    let token = session::create_session(&state.db, user_id, state.config.auth.session_hours)?;
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({
            "message": "Logged in",
            "user": {
                "id": user_id,
                "username": req.username,
                "email": email,
                "displayName": display_name,
                "avatar": avatar,
            },
        })),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = cookie_value(&headers, &state.config.auth.cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    let cookie = clear_session_cookie(&state.config.auth.cookie_name);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "message": "Logged out" })),
    )
        .into_response())
}

pub async fn me(user: CurrentUser) -> AppResult<Response> {
    Ok(Json(json!({
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "displayName": user.display_name,
        },
    }))
    .into_response())
}
