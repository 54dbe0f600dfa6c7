//! Page rendering.
//!
//! Handlers return a [`View`]: a template name, a status and a JSON context.
//! The [`render_views`] middleware turns it into a body through whichever
//! [`ViewRenderer`] the app was built with, so handlers never touch HTML and
//! tests can assert on the context instead of markup.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use minijinja::Environment;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::session::SessionData;

pub const ERROR_VIEW: &str = "error";

#[derive(Debug, Clone)]
pub struct View {
    pub name: &'static str,
    pub status: StatusCode,
    pub context: Map<String, Value>,
}

impl View {
    pub fn new(name: &'static str) -> Self {
        View {
            name,
            status: StatusCode::OK,
            context: Map::new(),
        }
    }

    /// Page rendered inside the signed-in layout.
    pub fn page(name: &'static str, session: &SessionData, current_page: &str) -> Self {
        View::new(name)
            .with("username", &session.username)
            .with("role", &session.role)
            .with("is_super_admin", session.is_super_admin())
            .with("current_page", current_page)
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        View::new(ERROR_VIEW)
            .status(status)
            .with("status", status.as_u16())
            .with("message", message.into())
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a context value. Values that fail to serialize become `null`.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.context.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for View {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// A `302 Found` redirect.
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[derive(Debug)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: String,
}

pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &View) -> Result<Rendered, String>;
}

/// Renders `<template_dir>/<name>.html` with minijinja.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(template_dir: &str) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(template_dir));
        env.add_filter("truncate_chars", truncate_chars);
        TemplateRenderer { env }
    }
}

impl ViewRenderer for TemplateRenderer {
    fn render(&self, view: &View) -> Result<Rendered, String> {
        let template = self
            .env
            .get_template(&format!("{}.html", view.name))
            .map_err(|e| e.to_string())?;
        let body = template.render(&view.context).map_err(|e| e.to_string())?;
        Ok(Rendered {
            content_type: "text/html; charset=utf-8",
            body,
        })
    }
}

/// Emits `{"view": name, "context": {...}}`; used by the test harness.
pub struct JsonRenderer;

impl ViewRenderer for JsonRenderer {
    fn render(&self, view: &View) -> Result<Rendered, String> {
        let body = serde_json::json!({ "view": view.name, "context": view.context });
        Ok(Rendered {
            content_type: "application/json",
            body: body.to_string(),
        })
    }
}

fn truncate_chars(value: String, limit: usize) -> String {
    if value.chars().count() <= limit {
        value
    } else {
        let mut out: String = value.chars().take(limit).collect();
        out.push('…');
        out
    }
}

/// Outermost middleware: renders any [`View`] left in the response extensions.
pub async fn render_views(
    State(renderer): State<Arc<dyn ViewRenderer>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let Some(view) = response.extensions_mut().remove::<View>() else {
        return response;
    };

    match renderer.render(&view) {
        Ok(rendered) => {
            let (mut parts, _) = response.into_parts();
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(rendered.content_type),
            );
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(rendered.body))
        }
        Err(err) => {
            tracing::error!(view = view.name, error = %err, "failed to render view");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
