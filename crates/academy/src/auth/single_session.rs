//! One signed-in browser per user.
//!
//! Each login writes a fresh random token to the user row and into the new
//! session cookie. The write replaces whatever token an earlier login left
//! there, so every older cookie stops matching and is thrown out on its next
//! request. Last writer wins; no locking is involved.

use chrono::Utc;
use rand::{RngCore, rngs::OsRng};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::auth::session::SessionData;
use crate::error::AppError;
use crate::models::user;

/// Outcome of checking a session against the stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Cookie token matches the stored one.
    Valid,
    /// Nothing to compare: enforcement is off or the cookie has no token.
    Bypassed,
    /// Superseded by a newer login, signed out, or the user is gone.
    Expired,
}

/// 256 random bits, hex-encoded.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Store a new token for the user and return it, replacing any previous one.
pub async fn issue(db: &DatabaseConnection, user_id: i32) -> Result<String, AppError> {
    let token = generate_session_token();
    persist(db, user_id, Some(token.clone())).await?;
    Ok(token)
}

/// Forget the stored token so no outstanding cookie can match it.
pub async fn clear(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
    persist(db, user_id, None).await
}

async fn persist(
    db: &DatabaseConnection,
    user_id: i32,
    token: Option<String>,
) -> Result<(), AppError> {
    user::Entity::update_many()
        .col_expr(user::Column::SessionToken, Expr::value(token))
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Compare the session's token with the one stored for its user.
///
/// Lookup failures count as expiry: a session that cannot be confirmed is
/// not trusted.
pub async fn reconcile(
    db: &DatabaseConnection,
    session: &SessionData,
    enforce: bool,
) -> Reconciliation {
    let Some(presented) = session.session_token.as_deref() else {
        return Reconciliation::Bypassed;
    };
    if !enforce {
        return Reconciliation::Bypassed;
    }

    let stored = match user::Entity::find_by_id(session.user_id).one(db).await {
        Ok(Some(user)) => user.session_token,
        Ok(None) => None,
        Err(e) => {
            tracing::error!(user_id = session.user_id, error = %e, "session token lookup failed");
            None
        }
    };

    match stored {
        Some(stored) if tokens_match(&stored, presented) => Reconciliation::Valid,
        _ => Reconciliation::Expired,
    }
}

fn tokens_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(generate_session_token(), generate_session_token());
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc123", "abc123"));
        assert!(!tokens_match("abc123", "abc124"));
        assert!(!tokens_match("abc", "abc123"));
        assert!(!tokens_match("", "a"));
    }
}
