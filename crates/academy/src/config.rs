use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. sqlite://academy.db?mode=rwc, postgres://...)
    pub database_url: String,

    /// Secret used to sign the session cookie.
    pub session_secret: String,

    /// Session cookie lifetime in seconds (default: 3 days)
    pub session_max_age_secs: u64,

    /// Mark the session cookie `Secure` (HTTPS only).
    pub cookie_secure: bool,

    /// Allow only the most recent login of each user to stay signed in.
    ///
    /// When `false`, logins issue no device token and the reconciliation
    /// check is skipped for every session.
    pub enforce_single_session: bool,

    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 8080)
    pub server_port: u16,

    /// Environment: development, production, test
    pub environment: String,

    /// Directory holding the `.html` view templates.
    pub template_dir: String,

    /// Super administrator created on first start when no user exists.
    pub bootstrap_admin: BootstrapAdmin,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub name: String,
}

pub const DEFAULT_SESSION_SECRET: &str = "academy-dev-secret-change-me";
pub const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 86_400 * 3;

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        let session_secret = match std::env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("SESSION_SECRET not set; using insecure dev default");
                DEFAULT_SESSION_SECRET.to_string()
            }
        };

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://academy.db?mode=rwc".to_string()),
            session_secret,
            session_max_age_secs: std::env::var("SESSION_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECS),
            cookie_secure: env_flag("COOKIE_SECURE", false),
            enforce_single_session: env_flag("ENFORCE_SINGLE_SESSION", true),
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            template_dir: std::env::var("TEMPLATE_DIR").unwrap_or_else(|_| default_template_dir()),
            bootstrap_admin: BootstrapAdmin {
                username: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
                password: std::env::var("ADMIN_PASSWORD")
                    .unwrap_or_else(|_| "admin1234".to_string()),
                name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
            },
        })
    }

    /// Deterministic configuration backed by an in-memory SQLite database.
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            session_secret: "test-session-secret".to_string(),
            session_max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
            cookie_secure: false,
            enforce_single_session: true,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            environment: "test".to_string(),
            template_dir: default_template_dir(),
            bootstrap_admin: BootstrapAdmin {
                username: "root".to_string(),
                password: "root-password".to_string(),
                name: "Root".to_string(),
            },
        }
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn default_template_dir() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string()
}
