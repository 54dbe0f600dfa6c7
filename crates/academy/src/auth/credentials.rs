use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::auth::password::{verify_dummy, verify_password};
use crate::error::AppError;
use crate::models::user;

/// Resolve a username/password pair to its account.
///
/// An unknown username and a wrong password both yield
/// [`AppError::InvalidCredentials`] after one Argon2 verification, so callers
/// cannot tell them apart by message or by timing.
pub async fn verify(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<user::Model, AppError> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?;

    match found {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        Some(_) => Err(AppError::InvalidCredentials),
        None => {
            verify_dummy(password);
            Err(AppError::InvalidCredentials)
        }
    }
}
