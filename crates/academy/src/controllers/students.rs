use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::{CurrentUser, SessionData};
use crate::error::{AppError, AppResult};
use crate::listing::{ListQuery, contains_term, fetch_page};
use crate::models::student::{self, Gender, sanitize_phone};
use crate::view::{View, found};

use super::{AppState, non_empty, parse_id};

const LIST: &str = "/students";

// ── Request types ──

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct StudentForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub parent_phone: String,
    #[serde(default)]
    pub remarks: String,
}

/// Form input that passed validation.
struct ValidStudent {
    name: String,
    gender: Gender,
    phone: Option<String>,
    parent_phone: Option<String>,
    remarks: Option<String>,
}

impl StudentForm {
    fn validate(&self) -> Result<ValidStudent, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Please enter a name.".to_string()));
        }
        let gender = Gender::parse(&self.gender)
            .ok_or_else(|| AppError::Validation("Please select a gender.".to_string()))?;

        Ok(ValidStudent {
            name: name.to_string(),
            gender,
            phone: sanitize_phone(&self.phone),
            parent_phone: sanitize_phone(&self.parent_phone),
            remarks: non_empty(&self.remarks),
        })
    }
}

// ── Routes ──

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list).post(create))
        .route("/students/new", get(new_form))
        .route("/students/{id}", post(update))
        .route("/students/{id}/edit", get(edit_form))
        .route("/students/{id}/delete", post(delete))
}

// ── Handlers ──

async fn list(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    query: ListQuery,
) -> AppResult<View> {
    let req = query.page_request();
    let search = query.search();
    let gender = query.gender();

    let backend = state.db.get_database_backend();
    let mut select = student::Entity::find();
    if let Some(term) = &search {
        select = select.filter(
            Condition::any()
                .add(contains_term(backend, student::Column::Name, term))
                .add(contains_term(backend, student::Column::Phone, term))
                .add(contains_term(backend, student::Column::ParentPhone, term)),
        );
    }
    if let Some(gender) = gender {
        select = select.filter(student::Column::Gender.eq(gender.as_str()));
    }
    let select = select.order_by_desc(student::Column::Id);

    let page = fetch_page(&state.db, select, &req).await?;

    Ok(page
        .into_view(View::page("students", &session, "students"), "students")
        .with("search", search.unwrap_or_default())
        .with("gender", gender.map(|g| g.as_str()).unwrap_or_default()))
}

async fn new_form(CurrentUser(session): CurrentUser) -> View {
    form_view(&session, "New student", LIST.to_string(), &StudentForm::default())
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Form(form): Form<StudentForm>,
) -> Response {
    let action = LIST.to_string();
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(err) => {
            return form_error(
                &session,
                "New student",
                action,
                &form,
                err.status_code(),
                &err.public_message(),
            );
        }
    };

    let now = Utc::now().naive_utc();
    let inserted = student::ActiveModel {
        name: Set(valid.name),
        gender: Set(valid.gender.as_str().to_string()),
        phone: Set(valid.phone),
        parent_phone: Set(valid.parent_phone),
        remarks: Set(valid.remarks),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    match inserted {
        Ok(student) => {
            tracing::info!(student_id = student.id, user_id = session.user_id, "student created");
            found(LIST)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to create student");
            form_error(
                &session,
                "New student",
                action,
                &form,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save the student.",
            )
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
    let Some(student) = student::Entity::find_by_id(id).one(&state.db).await? else {
        return Ok(found(LIST));
    };

    Ok(form_view(&session, "Edit student", format!("/students/{id}"), &student).into_response())
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<StudentForm>,
) -> AppResult<Response> {
    let Some(id) = parse_id(&id) else {
        return Ok(found(LIST));
    };
    let action = format!("/students/{id}");

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(err) => {
            return Ok(form_error(
                &session,
                "Edit student",
                action,
                &form,
                err.status_code(),
                &err.public_message(),
            ));
        }
    };

    let Some(existing) = student::Entity::find_by_id(id).one(&state.db).await? else {
        return Ok(found(LIST));
    };

    let mut model = existing.into_active_model();
    model.name = Set(valid.name);
    model.gender = Set(valid.gender.as_str().to_string());
    model.phone = Set(valid.phone);
    model.parent_phone = Set(valid.parent_phone);
    model.remarks = Set(valid.remarks);
    model.updated_at = Set(Utc::now().naive_utc());

    if let Err(e) = model.update(&state.db).await {
        tracing::error!(student_id = id, error = %e, "failed to update student");
        return Ok(form_error(
            &session,
            "Edit student",
            action,
            &form,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save the student.",
        ));
    }

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

    let result = student::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected > 0 {
        tracing::info!(student_id = id, user_id = session.user_id, "student deleted");
    }

    Ok(found(LIST))
}

// ── Views ──

fn form_view(session: &SessionData, title: &str, action: String, student: &impl Serialize) -> View {
    View::page("student_form", session, "students")
        .with("title", title)
        .with("action", action)
        .with("student", student)
}

fn form_error(
    session: &SessionData,
    title: &str,
    action: String,
    form: &StudentForm,
    status: StatusCode,
    message: &str,
) -> Response {
    form_view(session, title, action, form)
        .status(status)
        .with("error", message)
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, gender: &str) -> StudentForm {
        StudentForm {
            name: name.to_string(),
            gender: gender.to_string(),
            phone: "010-1234-5678".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_rejects_blank_name_and_bad_gender() {
        for bad in [form("  ", "M"), form("Kim", "X"), form("Kim", "")] {
            let err = bad.validate().err().unwrap();
            assert!(matches!(err, AppError::Validation(_)));
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
        let err = form("", "M").validate().err().unwrap();
        assert_eq!(err.public_message(), "Please enter a name.");
    }

    #[test]
    fn test_validate_normalizes_fields() {
        let valid = form(" Kim ", "F").validate().unwrap();
        assert_eq!(valid.name, "Kim");
        assert_eq!(valid.gender, Gender::F);
        assert_eq!(valid.phone.as_deref(), Some("01012345678"));
        assert_eq!(valid.parent_phone, None);
        assert_eq!(valid.remarks, None);
    }
}
