// Core infrastructure modules
pub mod document_store;   // Store interface, queries and batches
pub mod memory_store;     // In-process backend
pub mod sqlite_store;     // SQLite backend
pub mod id_generator;     // Sortable document ids
pub mod reconciliation;   // Follow-edge repair log
pub mod viewer;           // Request identity

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;

pub use document_store::{Direction, Document, DocumentStore, Fields, Filter, Query, WriteOp};
pub use id_generator::{current_time_millis, DocumentIdGenerator};
pub use memory_store::MemoryStore;
pub use reconciliation::{MirrorRepair, ReconcileStats, ReconciliationLog};
pub use sqlite_store::SqliteStore;
pub use viewer::{ViewerContext, USER_ID_HEADER};

/// Open the backend named by `DATABASE_URL`: `memory` for the in-process store,
/// anything else is handed to SQLite.
pub async fn open_store(config: &Config) -> AppResult<Arc<dyn DocumentStore>> {
    let limit = config.database.in_filter_limit;
    let url = config.database.url.trim();

    let store: Arc<dyn DocumentStore> = if url.eq_ignore_ascii_case("memory") {
        Arc::new(MemoryStore::new(limit))
    } else {
        Arc::new(SqliteStore::connect(url, limit).await?)
    };

    info!(backend = store.name(), in_filter_limit = limit, "document store ready");
    Ok(store)
}
