use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::{CurrentUser, SessionData};
use crate::error::{AppError, AppResult};
use crate::listing::{ListQuery, contains_term, fetch_page};
use crate::models::evaluation::{self, EvaluationEntry};
use crate::models::{student, user};
use crate::view::{View, found};

use super::{AppState, parse_id};

const STUDENTS: &str = "/students";

fn list_path(student_id: i32) -> String {
    format!("/students/{student_id}/evaluations")
}

// ── Request types ──

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct EvaluationForm {
    #[serde(default)]
    pub content: String,
}

impl EvaluationForm {
    fn validate(&self) -> Result<(), AppError> {
        if self.content.trim().is_empty() {
            return Err(AppError::Validation("Please enter the evaluation.".to_string()));
        }
        Ok(())
    }
}

// ── Routes ──

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students/{id}/evaluations", get(list).post(create))
        .route("/students/{id}/evaluations/new", get(new_form))
        .route("/students/{id}/evaluations/{eval_id}", post(update))
        .route("/students/{id}/evaluations/{eval_id}/edit", get(edit_form))
        .route("/students/{id}/evaluations/{eval_id}/delete", post(delete))
}

// ── Handlers ──

async fn list(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    query: ListQuery,
) -> AppResult<Response> {
    let Some(student_id) = parse_id(&id) else {
        return Ok(found(STUDENTS));
    };
    let student = find_student(&state.db, student_id).await?;

    let req = query.page_request();
    let search = query.search();
    let range = query.date_range();

    let mut select =
        evaluation::Entity::find().filter(evaluation::Column::StudentId.eq(student_id));
    if let Some(term) = &search {
        let backend = state.db.get_database_backend();
        select = select.filter(contains_term(backend, evaluation::Column::Content, term));
    }
    if let Some(from) = range.lower_bound() {
        select = select.filter(evaluation::Column::CreatedAt.gte(from));
    }
    if let Some(until) = range.upper_bound_exclusive() {
        select = select.filter(evaluation::Column::CreatedAt.lt(until));
    }
    let select = select
        .order_by_desc(evaluation::Column::CreatedAt)
        .order_by_desc(evaluation::Column::Id);

    let page = fetch_page(&state.db, select, &req).await?;
    let authors = author_names(&state.db, &page.items).await?;
    let page = page.map(|e| EvaluationEntry {
        author_name: authors
            .get(&e.author_id)
            .cloned()
            .unwrap_or_else(|| "(deleted user)".to_string()),
        id: e.id,
        student_id: e.student_id,
        author_id: e.author_id,
        content: e.content,
        created_at: e.created_at,
    });

    let view = page
        .into_view(View::page("evaluations", &session, "students"), "evaluations")
        .with("student", &student)
        .with("search", search.unwrap_or_default())
        .with(
            "start_date",
            range.start.map(|d| d.to_string()).unwrap_or_default(),
        )
        .with(
            "end_date",
            range.end.map(|d| d.to_string()).unwrap_or_default(),
        );
    Ok(view.into_response())
}

async fn new_form(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(student_id) = parse_id(&id) else {
        return Ok(found(STUDENTS));
    };
    let student = find_student(&state.db, student_id).await?;

    Ok(form_view(
        &session,
        &student,
        "New evaluation",
        list_path(student_id),
        &EvaluationForm::default(),
    )
    .into_response())
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<EvaluationForm>,
) -> AppResult<Response> {
    let Some(student_id) = parse_id(&id) else {
        return Ok(found(STUDENTS));
    };
    let student = find_student(&state.db, student_id).await?;
    let action = list_path(student_id);

    if let Err(err) = form.validate() {
        return Ok(form_view(&session, &student, "New evaluation", action, &form)
            .status(err.status_code())
            .with("error", err.public_message())
            .into_response());
    }

    let now = Utc::now().naive_utc();
    let inserted = evaluation::ActiveModel {
        student_id: Set(student_id),
        author_id: Set(session.user_id),
        content: Set(form.content.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    if let Err(e) = inserted {
        tracing::error!(student_id, error = %e, "failed to create evaluation");
        return Ok(form_view(&session, &student, "New evaluation", action, &form)
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .with("error", "Failed to save the evaluation.")
            .into_response());
    }

    Ok(found(&list_path(student_id)))
}

async fn edit_form(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((id, eval_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let Some(student_id) = parse_id(&id) else {
        return Ok(found(STUDENTS));
    };
    let Some(eval_id) = parse_id(&eval_id) else {
        return Ok(found(&list_path(student_id)));
    };
    let student = find_student(&state.db, student_id).await?;
    let Some(existing) = find_evaluation(&state.db, student_id, eval_id).await? else {
        return Ok(found(&list_path(student_id)));
    };

    let form = EvaluationForm {
        content: existing.content,
    };
    Ok(form_view(
        &session,
        &student,
        "Edit evaluation",
        format!("{}/{eval_id}", list_path(student_id)),
        &form,
    )
    .into_response())
}

/// Only the content changes; the author stays whoever wrote the note.
async fn update(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((id, eval_id)): Path<(String, String)>,
    Form(form): Form<EvaluationForm>,
) -> AppResult<Response> {
    let Some(student_id) = parse_id(&id) else {
        return Ok(found(STUDENTS));
    };
    let Some(eval_id) = parse_id(&eval_id) else {
        return Ok(found(&list_path(student_id)));
    };
    let student = find_student(&state.db, student_id).await?;
    let Some(existing) = find_evaluation(&state.db, student_id, eval_id).await? else {
        return Ok(found(&list_path(student_id)));
    };
    let action = format!("{}/{eval_id}", list_path(student_id));

    if let Err(err) = form.validate() {
        return Ok(form_view(&session, &student, "Edit evaluation", action, &form)
            .status(err.status_code())
            .with("error", err.public_message())
            .into_response());
    }

    let mut model = existing.into_active_model();
    model.content = Set(form.content.clone());
    model.updated_at = Set(Utc::now().naive_utc());

    if let Err(e) = model.update(&state.db).await {
        tracing::error!(evaluation_id = eval_id, error = %e, "failed to update evaluation");
        return Ok(form_view(&session, &student, "Edit evaluation", action, &form)
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .with("error", "Failed to save the evaluation.")
            .into_response());
    }

    Ok(found(&list_path(student_id)))
}

async fn delete(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((id, eval_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let Some(student_id) = parse_id(&id) else {
        return Ok(found(STUDENTS));
    };
    let Some(eval_id) = parse_id(&eval_id) else {
        return Ok(found(&list_path(student_id)));
    };

    let result = evaluation::Entity::delete_many()
        .filter(evaluation::Column::Id.eq(eval_id))
        .filter(evaluation::Column::StudentId.eq(student_id))
        .exec(&state.db)
        .await?;
    if result.rows_affected > 0 {
        tracing::info!(evaluation_id = eval_id, user_id = session.user_id, "evaluation deleted");
    }

    Ok(found(&list_path(student_id)))
}

// ── Helpers ──

async fn find_student(db: &DatabaseConnection, id: i32) -> AppResult<student::Model> {
    student::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student".to_string()))
}

/// An evaluation addressed under another student's path does not exist.
async fn find_evaluation(
    db: &DatabaseConnection,
    student_id: i32,
    eval_id: i32,
) -> AppResult<Option<evaluation::Model>> {
    Ok(evaluation::Entity::find_by_id(eval_id)
        .one(db)
        .await?
        .filter(|e| e.student_id == student_id))
}

async fn author_names(
    db: &DatabaseConnection,
    evaluations: &[evaluation::Model],
) -> AppResult<HashMap<i32, String>> {
    let mut ids: Vec<i32> = evaluations.iter().map(|e| e.author_id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let authors = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(authors.into_iter().map(|u| (u.id, u.name)).collect())
}

fn form_view(
    session: &SessionData,
    student: &student::Model,
    title: &str,
    action: String,
    form: &EvaluationForm,
) -> View {
    View::page("evaluation_form", session, "students")
        .with("title", title)
        .with("action", action)
        .with("student", student)
        .with("evaluation", form)
}
