use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::view::{View, found};

/// Errors surfaced by request handlers.
///
/// Every variant renders as an HTML error page except `Unauthorized`,
/// which sends the browser back to the login form.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Login required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the browser.
    ///
    /// Server-side failures never leak their cause.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(what) => format!("{what} not found"),
            AppError::Unauthorized => "Please log in".to_string(),
            AppError::Forbidden(_) => "You do not have permission to do that".to_string(),
            AppError::InvalidCredentials => self.to_string(),
            AppError::Database(_) | AppError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Unauthorized => return found("/login"),
            AppError::Database(err) => tracing::error!(error = %err, "database error"),
            AppError::Internal(msg) => tracing::error!(error = %msg, "internal error"),
            AppError::Forbidden(reason) => tracing::warn!(%reason, "forbidden"),
            _ => {}
        }

        View::error(self.status_code(), self.public_message()).into_response()
    }
}
