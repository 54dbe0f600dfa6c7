//! Route guards.
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/admin/users", get(list))
//!     .route_layer(from_fn(admin_required))
//!     .route_layer(from_fn_with_state(state.clone(), auth_required))
//! ```
//!
//! `route_layer` wraps outward, so the last one added runs first:
//! `auth_required` resolves the session, then `admin_required` checks its role.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::session::SessionData;
use crate::auth::single_session::{self, Reconciliation};
use crate::controllers::AppState;
use crate::error::AppError;
use crate::view::found;

pub const SESSION_EXPIRED_LOCATION: &str = "/login?reason=session_expired";

/// Require a signed-in admin-tier session.
///
/// Without a session the request is redirected to `/login`. A session that
/// lost its single-session token is cleared and redirected with
/// `reason=session_expired`. Otherwise the [`SessionData`] is handed to the
/// handler through request extensions.
pub async fn auth_required(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(session) = state.sessions.get(&jar) else {
        return found("/login");
    };

    let outcome =
        single_session::reconcile(&state.db, &session, state.config.enforce_single_session).await;
    if outcome == Reconciliation::Expired {
        tracing::info!(
            user_id = session.user_id,
            username = %session.username,
            "session superseded by another login"
        );
        let jar = state.sessions.destroy(jar);
        return (jar, found(SESSION_EXPIRED_LOCATION)).into_response();
    }

    req.extensions_mut().insert(session);
    next.run(req).await
}

/// Require the session role to be `admin` or `super_admin`.
///
/// Must run inside [`auth_required`].
pub async fn admin_required(req: Request, next: Next) -> Result<Response, AppError> {
    let session = req
        .extensions()
        .get::<SessionData>()
        .ok_or(AppError::Unauthorized)?;

    if session.role().is_none() {
        return Err(AppError::Forbidden(format!(
            "user {} has role {:?}",
            session.user_id, session.role
        )));
    }

    Ok(next.run(req).await)
}

/// Session of the signed-in user, placed by [`auth_required`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionData);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
