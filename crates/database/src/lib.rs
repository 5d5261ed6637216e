//! # Quote Ingest Database Crate
//!
//! This crate is the application-specific interface to the PostgreSQL
//! database that holds the `stock_data` table (see `schema.sql`).
//!
//! ## Public API
//!
//! - `connect`: opens a small connection pool from `DatabaseSettings`.
//! - `QuoteStore` / `StoreConnector`: the storage seam the pipeline depends on.
//! - `DbRepository` / `PgConnector`: the Postgres implementation, writing each
//!   batch as one transactional `INSERT ... ON CONFLICT DO UPDATE`.
//! - `MemoryQuoteStore` / `MemoryConnector`: an in-process implementation with
//!   the same semantics, for tests and dry runs.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::connect;
pub use error::DbError;
pub use memory::{MemoryConnector, MemoryQuoteStore};
pub use repository::{DbRepository, PgConnector, QuoteStore, StoreConnector};
