use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database as SeaDatabase, DatabaseConnection, EntityTrait,
    PaginatorTrait, Set,
};

use crate::auth::password::hash_password;
use crate::config::{BootstrapAdmin, Config};
use crate::error::AppError;
use crate::models::{Role, user};

/// Open the connection pool described by the config.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opts = ConnectOptions::new(&config.database_url);

    if is_in_memory_sqlite(&config.database_url) {
        // Each pooled connection would otherwise get its own empty database.
        opts.max_connections(1).min_connections(1);
    } else {
        opts.max_connections(20)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800));
    }

    opts.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(config.is_dev());

    SeaDatabase::connect(opts).await
}

fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite::memory:") || url.contains("mode=memory")
}

/// Create the first super_admin when the users table is empty.
///
/// Returns `true` when an account was created.
pub async fn bootstrap_admin(
    db: &DatabaseConnection,
    admin: &BootstrapAdmin,
) -> Result<bool, AppError> {
    if user::Entity::find().count(db).await? > 0 {
        return Ok(false);
    }

    if admin.password == "admin1234" {
        tracing::warn!(
            username = %admin.username,
            "creating super_admin with the default password; change it after first login"
        );
    }

    let now = Utc::now().naive_utc();
    user::ActiveModel {
        username: Set(admin.username.clone()),
        name: Set(admin.name.clone()),
        password_hash: Set(hash_password(&admin.password)?),
        role: Set(Role::SuperAdmin.as_str().to_string()),
        session_token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(username = %admin.username, "bootstrapped super_admin account");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory_sqlite("sqlite::memory:"));
        assert!(is_in_memory_sqlite("sqlite://file:academy?mode=memory&cache=shared"));
        assert!(!is_in_memory_sqlite("sqlite://academy.db?mode=rwc"));
        assert!(!is_in_memory_sqlite("postgres://localhost/academy"));
    }
}
