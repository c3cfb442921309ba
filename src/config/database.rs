//! Database configuration module for `MenuStudio`.
//!
//! Handles the `SQLite` connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs.
//!
//! The ledger defaults to an in-memory database: balances and logs live as long
//! as the bot process. Point `DATABASE_URL` at a file to keep them across restarts.
//!
//! An in-memory `SQLite` database exists only while its connection is open, so
//! the pool for one keeps a single connection that is never reaped or recycled.

use crate::entities::{ActivityLog, User};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Idle timeout and max lifetime for the in-memory pool, long enough to never expire
const MEMORY_CONNECTION_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Gets the database URL from the environment or returns the in-memory default.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Whether `url` names an in-memory `SQLite` database.
#[must_use]
pub fn is_memory_url(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}

/// Pool options for `url`.
///
/// In-memory databases get exactly one connection that stays open for the
/// life of the process.
#[must_use]
pub fn connect_options(url: &str) -> ConnectOptions {
    let mut options = ConnectOptions::new(url.to_string());
    if is_memory_url(url) {
        options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(MEMORY_CONNECTION_LIFETIME)
            .max_lifetime(MEMORY_CONNECTION_LIFETIME);
    }
    options
}

/// Connects to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    tracing::info!("Connecting to database at {database_url}");
    if is_memory_url(&database_url) {
        tracing::warn!("Using an in-memory ledger, balances are lost when the bot stops");
    }
    Database::connect(connect_options(&database_url))
        .await
        .map_err(Into::into)
}

/// Creates the `users` and `activity_logs` tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let user_table = schema
        .create_table_from_entity(User)
        .if_not_exists()
        .to_owned();
    let log_table = schema
        .create_table_from_entity(ActivityLog)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&user_table)).await?;
    db.execute(builder.build(&log_table)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ActivityLogModel, UserModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<ActivityLogModel> = ActivityLog::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[test]
    fn test_memory_pool_keeps_its_connection() {
        let options = connect_options("sqlite::memory:");
        assert_eq!(options.get_max_connections(), Some(1));
        assert_eq!(options.get_min_connections(), Some(1));
        assert_eq!(options.get_idle_timeout(), Some(MEMORY_CONNECTION_LIFETIME));
        assert_eq!(options.get_max_lifetime(), Some(MEMORY_CONNECTION_LIFETIME));
    }

    #[test]
    fn test_file_pool_uses_driver_defaults() {
        assert!(!is_memory_url("sqlite://menu_studio.db?mode=rwc"));
        let options = connect_options("sqlite://menu_studio.db?mode=rwc");
        assert_eq!(options.get_min_connections(), None);
        assert_eq!(options.get_idle_timeout(), None);
    }

    #[tokio::test]
    async fn test_memory_ledger_survives_across_queries() -> Result<()> {
        let db = Database::connect(connect_options("sqlite::memory:")).await?;
        create_tables(&db).await?;
        for _ in 0..3 {
            let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
