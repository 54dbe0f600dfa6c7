pub mod app;
pub mod auth;
pub mod config;
pub mod controllers;
pub mod db;
pub mod error;
pub mod listing;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod policy;
pub mod routing;
pub mod testing;
pub mod view;

pub use app::App;
pub use config::Config;
pub use controllers::AppState;
pub use error::AppError;
pub use testing::{TestApp, TestResponse};
pub use view::View;
