use axum::Router;
use axum::extract::State;
use axum::routing::get;
use sea_orm::{EntityTrait, PaginatorTrait};

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::models::{student, user};
use crate::view::View;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> AppResult<View> {
    let student_count = student::Entity::find().count(&state.db).await?;
    let user_count = user::Entity::find().count(&state.db).await?;

    Ok(View::page("dashboard", &session, "dashboard")
        .with("student_count", student_count)
        .with("user_count", user_count))
}
