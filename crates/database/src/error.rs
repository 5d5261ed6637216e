use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Database query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Refusing to store an invalid row: {0}")]
    InvalidRow(#[from] core_types::CoreError),

    #[error("The store is unavailable: {0}")]
    Unavailable(String),
}
