use crate::connection::connect;
use crate::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use configuration::DatabaseSettings;
use core_types::QuoteRow;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::QueryBuilder;
use std::collections::BTreeMap;

/// Postgres caps a statement at 65535 bind parameters; each row binds 8.
const ROWS_PER_STATEMENT: usize = 1000;

const INSERT_PREFIX: &str =
    "INSERT INTO stock_data (symbol, date, open, high, low, close, adjusted_close, volume) ";

const ON_CONFLICT_REPLACE: &str = " ON CONFLICT (symbol, date) DO UPDATE SET \
     open = EXCLUDED.open, \
     high = EXCLUDED.high, \
     low = EXCLUDED.low, \
     close = EXCLUDED.close, \
     adjusted_close = EXCLUDED.adjusted_close, \
     volume = EXCLUDED.volume";

/// Durable storage for quote rows.
///
/// `upsert_quotes` inserts rows whose `(symbol, date)` is new and fully
/// replaces rows whose key already exists. The batch is all-or-nothing, and
/// writing the same batch twice leaves the same state as writing it once.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Returns the number of rows in `rows`. An empty slice touches nothing.
    async fn upsert_quotes(&self, rows: &[QuoteRow]) -> Result<u64, DbError>;

    /// Releases the underlying connection(s).
    async fn close(&self);
}

/// Opens a fresh `QuoteStore` for one pipeline run.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn QuoteStore>, DbError>;
}

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches every stored row for a symbol, oldest first.
    pub async fn get_quotes(&self, symbol: &str) -> Result<Vec<QuoteRow>, DbError> {
        let rows = sqlx::query_as::<_, QuoteRow>(
            r#"
            SELECT symbol, date, open, high, low, close, adjusted_close, volume
            FROM stock_data
            WHERE symbol = $1
            ORDER BY date ASC
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl QuoteStore for DbRepository {
    async fn upsert_quotes(&self, rows: &[QuoteRow]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            row.validate()?;
        }

        let unique = collapse_duplicates(rows);

        // Dropping the transaction on an early `?` rolls it back.
        let mut tx = self.pool.begin().await?;
        for chunk in unique.chunks(ROWS_PER_STATEMENT) {
            let mut query = upsert_query(chunk);
            query.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::debug!(rows = rows.len(), distinct = unique.len(), "Upsert committed.");
        Ok(rows.len() as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Builds one multi-row `INSERT ... ON CONFLICT DO UPDATE` statement.
pub fn upsert_query(rows: &[&QuoteRow]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(INSERT_PREFIX);
    builder.push_values(rows, |mut values, row| {
        values
            .push_bind(row.symbol.clone())
            .push_bind(row.date)
            .push_bind(row.open)
            .push_bind(row.high)
            .push_bind(row.low)
            .push_bind(row.close)
            .push_bind(row.adjusted_close)
            .push_bind(row.volume);
    });
    builder.push(ON_CONFLICT_REPLACE);
    builder
}

/// Keeps the last row for every `(symbol, date)`.
///
/// Postgres rejects a single `ON CONFLICT DO UPDATE` statement that touches
/// the same key twice.
pub fn collapse_duplicates(rows: &[QuoteRow]) -> Vec<&QuoteRow> {
    let mut latest: BTreeMap<(&str, NaiveDate), &QuoteRow> = BTreeMap::new();
    for row in rows {
        latest.insert(row.key(), row);
    }
    latest.into_values().collect()
}

/// Connects a `DbRepository` over a short-lived pool for each run.
#[derive(Debug, Clone)]
pub struct PgConnector {
    settings: DatabaseSettings,
}

impl PgConnector {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl StoreConnector for PgConnector {
    async fn connect(&self) -> Result<Box<dyn QuoteStore>, DbError> {
        let pool = connect(&self.settings).await?;
        Ok(Box::new(DbRepository::new(pool)))
    }
}
