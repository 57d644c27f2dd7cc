use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{
    compare_values, Direction, Document, DocumentStore, Fields, Query, WriteOp,
};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// In-process document store. One lock guards every collection, so each
/// operation (and each batch) is atomic with respect to the others.
pub struct MemoryStore {
    collections: RwLock<Collections>,
    max_in_values: usize,
}

impl MemoryStore {
    pub fn new(max_in_values: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_in_values: max_in_values.max(1),
        }
    }

    /// Number of documents directly inside `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn apply(collections: &mut Collections, op: WriteOp) {
        match op {
            WriteOp::Set {
                collection,
                id,
                data,
            } => {
                collections.entry(collection).or_default().insert(id, data);
            }
            WriteOp::Delete { collection, id } => {
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10)
    }
}

fn not_found(collection: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{}/{} not found", collection, id))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;
        for (key, value) in fields {
            doc.insert(key, value);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        let current = match doc.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                AppError::BadRequest(format!("{} on {}/{} is not an integer", field, collection, id))
            })?,
        };
        doc.insert(field.to_string(), Value::from(current + delta));
        debug!(collection, id, field, delta, "memory increment");
        Ok(())
    }

    async fn query(&self, query: Query) -> AppResult<Vec<Document>> {
        query.check_in_limit(self.max_in_values)?;

        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(_, data)| query.filters.iter().all(|f| f.matches(data)))
            .map(|(id, data)| Document::new(id.clone(), data.clone()))
            .collect();

        if let Some(order) = &query.order_by {
            matched.sort_by(|a, b| {
                let ord = compare_values(a.data.get(&order.field), b.data.get(&order.field))
                    .then_with(|| a.id.cmp(&b.id));
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn list_ids(&self, collection: &str) -> AppResult<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        for op in writes {
            Self::apply(&mut collections, op);
        }
        Ok(())
    }

    fn max_in_values(&self) -> usize {
        self.max_in_values
    }
}
