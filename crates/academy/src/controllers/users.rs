use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::password::hash_password;
use crate::auth::{CurrentUser, SessionData};
use crate::error::{AppError, AppResult};
use crate::listing::{ListQuery, contains_term, fetch_page};
use crate::models::Role;
use crate::models::user::{self, UserSummary};
use crate::policy::{self, Actor, Target};
use crate::view::{View, found};

use super::{AppState, parse_id};

const LIST: &str = "/admin/users";

// ── Request types ──

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CreateUserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct UpdateUserForm {
    #[serde(default)]
    pub name: String,
    /// Empty keeps the current password.
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

// ── Routes ──

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list).post(create))
        .route("/admin/users/new", get(new_form))
        .route("/admin/users/{id}", post(update))
        .route("/admin/users/{id}/edit", get(edit_form))
        .route("/admin/users/{id}/delete", post(delete))
}

// ── Handlers ──

async fn list(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    query: ListQuery,
) -> AppResult<View> {
    let req = query.page_request();
    let search = query.search();

    let backend = state.db.get_database_backend();
    let mut select = user::Entity::find();
    if let Some(term) = &search {
        select = select.filter(
            Condition::any()
                .add(contains_term(backend, user::Column::Username, term))
                .add(contains_term(backend, user::Column::Name, term)),
        );
    }
    let select = select.order_by_asc(user::Column::Id);

    let page = fetch_page(&state.db, select, &req)
        .await?
        .map(UserSummary::from);

    Ok(page
        .into_view(View::page("users", &session, "users"), "users")
        .with("current_user_id", session.user_id)
        .with("search", search.unwrap_or_default()))
}

async fn new_form(CurrentUser(session): CurrentUser) -> AppResult<View> {
    policy::require_create(&Actor::from(&session))?;
    Ok(create_form_view(&session, &CreateUserForm::default()))
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Form(form): Form<CreateUserForm>,
) -> AppResult<Response> {
    let actor = Actor::from(&session);
    policy::require_create(&actor)?;

    let username = form.username.trim();
    let name = form.name.trim();
    if username.is_empty() || name.is_empty() || form.password.is_empty() {
        let err = AppError::Validation("Username, name and password are required.".to_string());
        return Ok(create_form_view(&session, &form)
            .status(err.status_code())
            .with("error", err.public_message())
            .into_response());
    }

    let role = policy::role_for_create(&actor, &form.role);
    let password_hash = hash_password(&form.password)?;
    let now = Utc::now().naive_utc();

    let inserted = user::ActiveModel {
        username: Set(username.to_string()),
        name: Set(name.to_string()),
        password_hash: Set(password_hash),
        role: Set(role.as_str().to_string()),
        session_token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    match inserted {
        Ok(created) => {
            tracing::info!(
                user_id = session.user_id,
                target_id = created.id,
                role = %role,
                "user created"
            );
            Ok(found(LIST))
        }
        Err(e) => {
            tracing::error!(username, error = %e, "failed to create user");
            Ok(create_form_view(&session, &form)
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .with(
                    "error",
                    "Failed to create the user. The username may already be taken.",
                )
                .into_response())
        }
    }
}

async fn edit_form(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(id) = parse_id(&id) else {
        return Ok(found(LIST));
    };
    let actor = Actor::from(&session);
    policy::require_edit(&actor, id)?;

    let Some(target) = user::Entity::find_by_id(id).one(&state.db).await? else {
        return Ok(found(LIST));
    };

    Ok(edit_form_view(&session, &actor, target).into_response())
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<UpdateUserForm>,
) -> AppResult<Response> {
    let Some(id) = parse_id(&id) else {
        return Ok(found(LIST));
    };
    let actor = Actor::from(&session);
    policy::require_edit(&actor, id)?;

    let Some(existing) = user::Entity::find_by_id(id).one(&state.db).await? else {
        return Ok(found(LIST));
    };

    let name = form.name.trim();
    if name.is_empty() {
        let err = AppError::Validation("Please enter a name.".to_string());
        return Ok(edit_form_view(&session, &actor, existing)
            .status(err.status_code())
            .with("error", err.public_message())
            .into_response());
    }

    let target = Target {
        id: existing.id,
        role: existing.role(),
    };
    let role = policy::role_for_update(&actor, &target, &form.role);

    let mut model = existing.clone().into_active_model();
    model.name = Set(name.to_string());
    model.role = Set(role.as_str().to_string());
    if !form.password.is_empty() {
        model.password_hash = Set(hash_password(&form.password)?);
    }
    model.updated_at = Set(Utc::now().naive_utc());

    if let Err(e) = model.update(&state.db).await {
        tracing::error!(target_id = id, error = %e, "failed to update user");
        return Ok(edit_form_view(&session, &actor, existing)
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .with("error", "Failed to save the user.")
            .into_response());
    }

    tracing::info!(user_id = session.user_id, target_id = id, role = %role, "user updated");
    Ok(found(LIST))
}

async fn delete(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(id) = parse_id(&id) else {
        return Ok(found(LIST));
    };
    policy::require_delete(&Actor::from(&session), id)?;

    let result = user::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected > 0 {
        tracing::info!(user_id = session.user_id, target_id = id, "user deleted");
    }

    Ok(found(LIST))
}

// ── Views ──

fn create_form_view(session: &SessionData, form: &CreateUserForm) -> View {
    View::page("user_form", session, "users")
        .with("title", "New user")
        .with("action", LIST)
        .with("is_new", true)
        .with("is_self", false)
        .with("can_change_role", true)
        .with("roles", [Role::Admin.as_str(), Role::SuperAdmin.as_str()])
        .with("user", form)
}

/// The role selector is shown only when the submitted role could take effect.
fn edit_form_view(session: &SessionData, actor: &Actor, target: user::Model) -> View {
    let is_self = actor.id == target.id;
    let can_change_role = actor.is_super_admin() && target.role() != Role::SuperAdmin;

    View::page("user_form", session, "users")
        .with("title", "Edit user")
        .with("action", format!("{LIST}/{}", target.id))
        .with("is_new", false)
        .with("is_self", is_self)
        .with("can_change_role", can_change_role)
        .with("roles", [Role::Admin.as_str(), Role::SuperAdmin.as_str()])
        .with("user", UserSummary::from(target))
}
