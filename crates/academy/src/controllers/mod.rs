use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::view::ViewRenderer;

/// Shared application state available in all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub views: Arc<dyn ViewRenderer>,
}

pub mod auth;
pub mod dashboard;
pub mod evaluations;
pub mod students;
pub mod users;

/// Path ids that fail to parse send the browser back to the list instead of
/// answering 400.
pub(crate) fn parse_id(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|id| *id > 0)
}

/// Empty form fields are stored as NULL.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
