//! In-process test harness.
//!
//! [`TestApp`] builds the full router over an in-memory SQLite database with
//! the JSON renderer and drives it with `tower::ServiceExt::oneshot`. No
//! socket is opened and redirects are never followed, so tests can assert on
//! the `Location` header and the rendered view context directly.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tower::ServiceExt;

use crate::auth::SESSION_COOKIE;
use crate::auth::password::hash_password;
use crate::auth::session::SessionData;
use crate::config::Config;
use crate::controllers::AppState;
use crate::models::{Role, user};
use crate::view::JsonRenderer;

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub config: Config,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::for_tests()).await
    }

    pub async fn with_config(config: Config) -> Self {
        crate::logging::init_test_logging();

        let app = crate::App::with_config(config)
            .await
            .expect("Failed to create test app")
            .with_renderer(Arc::new(JsonRenderer));

        TestApp {
            router: app.router(),
            state: app.state(),
            db: app.db,
            config: app.config,
        }
    }

    /// Insert an account directly, bypassing the role policy.
    pub async fn seed_user(&self, username: &str, password: &str, role: Role) -> user::Model {
        let now = Utc::now().naive_utc();
        user::ActiveModel {
            username: Set(username.to_string()),
            name: Set(format!("{username} name")),
            password_hash: Set(hash_password(password).expect("Failed to hash password")),
            role: Set(role.as_str().to_string()),
            session_token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to seed user")
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post_form(
            "/login",
            None,
            &[("username", username), ("password", password)],
        )
        .await
    }

    /// Log in and return the `Cookie` header value for the new session.
    pub async fn login_cookie(&self, username: &str, password: &str) -> String {
        let res = self.login(username, password).await;
        assert_eq!(res.status, StatusCode::FOUND, "Login failed: {}", res.body);
        res.session_cookie().expect("Login did not set a session cookie")
    }

    /// Sign arbitrary session data, as if a browser had kept an older cookie.
    pub fn session_cookie_for(&self, data: &SessionData) -> String {
        let value = self
            .state
            .sessions
            .encode(data)
            .expect("Failed to sign session");
        format!("{SESSION_COOKIE}={value}")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut req = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).expect("Failed to build request"))
            .await
    }

    pub async fn post_form(
        &self,
        path: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = serde_urlencoded::to_string(fields).expect("Failed to encode form");
        let mut req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body)).expect("Failed to build request"))
            .await
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Router returned an error");
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    fn session_set_cookie(&self) -> Option<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{SESSION_COOKIE}=")))
    }

    /// `session=<value>` from a non-empty `Set-Cookie`, ready to send back.
    pub fn session_cookie(&self) -> Option<String> {
        let pair = self.session_set_cookie()?.split(';').next()?.trim();
        let value = pair.strip_prefix(&format!("{SESSION_COOKIE}="))?;
        if value.is_empty() {
            None
        } else {
            Some(pair.to_string())
        }
    }

    /// Whether the response told the browser to drop the session cookie.
    pub fn clears_session_cookie(&self) -> bool {
        self.session_set_cookie()
            .map(|c| c.contains("Max-Age=0"))
            .unwrap_or(false)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response body is not JSON")
    }

    /// Name of the rendered view.
    pub fn view(&self) -> String {
        self.json()["view"].as_str().unwrap_or_default().to_string()
    }

    pub fn context(&self) -> serde_json::Value {
        self.json()["context"].clone()
    }
}
