use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Builds the connection options from the configured coordinates.
///
/// Every session gets a server-side `statement_timeout`, so a stuck write
/// cannot hang the run.
pub fn connect_options(settings: &DatabaseSettings) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .database(&settings.database)
        .username(&settings.user)
        .options([(
            "statement_timeout",
            settings.statement_timeout().as_millis().to_string(),
        )]);

    match &settings.password {
        Some(password) => options.password(password),
        None => options,
    }
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// The pool is small and meant to live for a single pipeline run; callers
/// close it when the run ends.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .connect_with(connect_options(settings))
        .await
        .map_err(DbError::ConnectionError)?;

    tracing::debug!(host = %settings.host, port = settings.port, database = %settings.database, "Database pool opened.");
    Ok(pool)
}
