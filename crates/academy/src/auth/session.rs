//! Cookie-backed sessions.
//!
//! The whole session lives in one HS256-signed JWT stored in the `session`
//! cookie. There is no server-side session table; the only server state is
//! the optional `session_token` column on the user row (see
//! [`single_session`](super::single_session)).

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Role, user};

pub const SESSION_COOKIE: &str = "session";

/// Identity carried by a signed-in browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl SessionData {
    pub fn for_user(user: &user::Model, session_token: Option<String>) -> Self {
        SessionData {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role().as_str().to_string(),
            session_token,
        }
    }

    /// `None` when the cookie names a role outside the admin tier.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role() == Some(Role::SuperAdmin)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    data: SessionData,
    iat: usize,
    exp: usize,
}

#[derive(Clone)]
pub struct SessionStore {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_age_secs: u64,
    secure: bool,
}

impl SessionStore {
    pub fn new(secret: &str, max_age_secs: u64, secure: bool) -> Self {
        SessionStore {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            max_age_secs,
            secure,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.session_secret,
            config.session_max_age_secs,
            config.cookie_secure,
        )
    }

    /// Sign session data into a cookie value.
    pub fn encode(&self, data: &SessionData) -> Result<String, AppError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            data: data.clone(),
            iat: now,
            exp: now + self.max_age_secs as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign session: {e}")))
    }

    /// Verify a cookie value. Bad signatures and expired sessions read as absent.
    pub fn decode(&self, value: &str) -> Option<SessionData> {
        match decode::<Claims>(value, &self.decoding, &Validation::default()) {
            Ok(token) => Some(token.claims.data),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session cookie");
                None
            }
        }
    }

    pub fn get(&self, jar: &CookieJar) -> Option<SessionData> {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| self.decode(cookie.value()))
    }

    pub fn create(&self, jar: CookieJar, data: &SessionData) -> Result<CookieJar, AppError> {
        let cookie = Cookie::build((SESSION_COOKIE, self.encode(data)?))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(self.max_age_secs as i64))
            .build();
        Ok(jar.add(cookie))
    }

    pub fn destroy(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }
}
