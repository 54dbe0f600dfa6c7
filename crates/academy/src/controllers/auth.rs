use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::auth::session::SessionData;
use crate::auth::{credentials, single_session};
use crate::error::{AppError, AppResult};
use crate::view::{View, found};

use super::AppState;

// ── Request types ──

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// ── Routes ──

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout).post(logout))
}

// ── Handlers ──

async fn index() -> Response {
    found("/login")
}

/// Login form. A browser that already holds a session goes to the dashboard.
async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> Response {
    if state.sessions.get(&jar).is_some() {
        return found("/dashboard");
    }

    View::new("login")
        .with(
            "session_expired",
            query.reason.as_deref() == Some("session_expired"),
        )
        .into_response()
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    if form.username.is_empty() || form.password.is_empty() {
        let err = AppError::Validation("Username and password are required".to_string());
        return Ok(login_error(
            err.status_code(),
            &err.public_message(),
            &form.username,
        ));
    }

    let user = match credentials::verify(&state.db, &form.username, &form.password).await {
        Ok(user) => user,
        Err(AppError::InvalidCredentials) => {
            tracing::warn!(username = %form.username, "login failed");
            let err = AppError::InvalidCredentials;
            return Ok(login_error(
                err.status_code(),
                &err.public_message(),
                &form.username,
            ));
        }
        Err(e) => return Err(e),
    };

    let token = if state.config.enforce_single_session {
        Some(single_session::issue(&state.db, user.id).await?)
    } else {
        None
    };

    let jar = state
        .sessions
        .create(jar, &SessionData::for_user(&user, token))?;

    tracing::info!(user_id = user.id, username = %user.username, "user logged in");
    Ok((jar, found("/dashboard")).into_response())
}

/// Clear the cookie and the stored token. A stale copy of the cookie on
/// another browser can then never match again.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(session) = state.sessions.get(&jar) {
        if let Err(e) = single_session::clear(&state.db, session.user_id).await {
            tracing::error!(user_id = session.user_id, error = %e, "failed to clear session token");
        }
        tracing::info!(user_id = session.user_id, username = %session.username, "user logged out");
    }

    let jar = state.sessions.destroy(jar);
    (jar, found("/login")).into_response()
}

fn login_error(status: StatusCode, message: &str, username: &str) -> Response {
    View::new("login")
        .status(status)
        .with("error", message)
        .with("username", username)
        .with("session_expired", false)
        .into_response()
}
