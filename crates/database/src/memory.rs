use crate::repository::{QuoteStore, StoreConnector};
use crate::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::QuoteRow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<(String, NaiveDate), QuoteRow>,
    writes: usize,
    closes: usize,
    fail_writes: bool,
}

/// An in-process `QuoteStore` with the same replace-on-conflict semantics as
/// the Postgres repository. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuoteStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent non-empty write fail without changing any row.
    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    /// All stored rows ordered by `(symbol, date)`.
    pub async fn rows(&self) -> Vec<QuoteRow> {
        self.state.lock().await.rows.values().cloned().collect()
    }

    /// Number of batches that reached storage.
    pub async fn writes(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Number of times the store was closed.
    pub async fn closes(&self) -> usize {
        self.state.lock().await.closes
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn upsert_quotes(&self, rows: &[QuoteRow]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            row.validate()?;
        }

        let mut state = self.state.lock().await;
        if state.fail_writes {
            return Err(DbError::Unavailable("write rejected".to_string()));
        }
        for row in rows {
            state.rows.insert((row.symbol.clone(), row.date), row.clone());
        }
        state.writes += 1;

        Ok(rows.len() as u64)
    }

    async fn close(&self) {
        self.state.lock().await.closes += 1;
    }
}

/// Hands out the same `MemoryQuoteStore` on every connect, or refuses.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryQuoteStore,
    refuse: Arc<AtomicBool>,
    connections: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new(store: MemoryQuoteStore) -> Self {
        Self { store, ..Self::default() }
    }

    /// A connector whose every `connect` fails.
    pub fn refusing(store: MemoryQuoteStore) -> Self {
        let connector = Self::new(store);
        connector.refuse.store(true, Ordering::SeqCst);
        connector
    }

    pub fn store(&self) -> &MemoryQuoteStore {
        &self.store
    }

    /// Number of `connect` calls, successful or not.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn QuoteStore>, DbError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("connection refused".to_string()));
        }
        Ok(Box::new(self.store.clone()))
    }
}
