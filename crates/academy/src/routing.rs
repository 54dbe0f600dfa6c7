use axum::Router;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};

use crate::auth::{admin_required, auth_required};
use crate::controllers::{self, AppState};
use crate::view::{View, render_views};

/// Build every route with its guards.
///
/// Public: `/`, `/login`, `/logout`.
/// Signed in: dashboard, students, evaluations.
/// Signed in with an admin-tier role: `/admin/users`.
pub fn build_routes(state: AppState) -> Router {
    let views = state.views.clone();
    let public = controllers::auth::routes();

    let signed_in = Router::new()
        .merge(controllers::dashboard::routes())
        .merge(controllers::students::routes())
        .merge(controllers::evaluations::routes())
        .route_layer(from_fn_with_state(state.clone(), auth_required));

    // Layers run last-added first: session check, then role check.
    let admin = controllers::users::routes()
        .route_layer(from_fn(admin_required))
        .route_layer(from_fn_with_state(state.clone(), auth_required));

    Router::new()
        .merge(public)
        .merge(signed_in)
        .merge(admin)
        .fallback(not_found)
        .with_state(state)
        .layer(from_fn_with_state(views, render_views))
}

async fn not_found() -> View {
    View::error(StatusCode::NOT_FOUND, "Page not found")
}
