// Document Store Interface - the persistence primitives the services depend on
// Backends provide get/set/update, per-field atomic increment, filtered queries
// and (optionally) atomic multi-document batches.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::{AppError, AppResult};

pub type Fields = Map<String, Value>;

/// A stored document: its id within the collection plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self { id: id.into(), data }
    }

    /// Deserialize into a model. The document id fills in `id` when the data lacks one.
    pub fn into_model<T: DeserializeOwned>(self) -> AppResult<T> {
        let Document { id, mut data } = self;
        data.entry("id".to_string()).or_insert(Value::String(id));
        serde_json::from_value(Value::Object(data)).map_err(AppError::from)
    }

    pub fn get_u64(&self, field: &str) -> Option<u64> {
        self.data.get(field).and_then(Value::as_u64)
    }
}

/// Serialize a model into document fields.
pub fn to_fields<T: Serialize>(model: &T) -> AppResult<Fields> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::SerializationError(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn is_in<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(field, _) | Filter::In(field, _) => field,
        }
    }

    pub fn matches(&self, data: &Fields) -> bool {
        match self {
            Filter::Eq(field, value) => data.get(field) == Some(value),
            Filter::In(field, values) => data.get(field).map_or(false, |v| values.contains(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Collection query: filters are ANDed, ties in `order_by` are broken by document id
/// in the same direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Rejects `in` filters wider than the backend accepts. Backends call this
    /// instead of truncating.
    pub fn check_in_limit(&self, max_in_values: usize) -> AppResult<()> {
        for filter in &self.filters {
            if let Filter::In(field, values) = filter {
                if values.len() > max_in_values {
                    return Err(AppError::BadRequest(format!(
                        "'in' filter on {} has {} values, backend accepts at most {}",
                        field,
                        values.len(),
                        max_in_values
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Total order over JSON scalars used for `order_by`: null < bool < number < string.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(0.0)
                .partial_cmp(&y.as_f64().unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Document store interface.
/// Implementations must make `increment` atomic: concurrent callers never lose an add.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;

    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;

    /// Create or overwrite a document.
    async fn set(&self, collection: &str, id: &str, data: Fields) -> AppResult<()>;

    /// Merge `fields` into an existing document. `NotFound` when absent.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()>;

    /// Remove a document. Removing an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> AppResult<()>;

    /// Atomically add `delta` to a numeric field (missing field counts as 0).
    /// `NotFound` when the document is absent.
    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()>;

    async fn query(&self, query: Query) -> AppResult<Vec<Document>>;

    /// Ids of every document directly inside `collection`.
    async fn list_ids(&self, collection: &str) -> AppResult<Vec<String>>;

    /// Whether `commit` applies a batch atomically.
    fn supports_transactions(&self) -> bool;

    /// Apply every write or none of them.
    async fn commit(&self, writes: Vec<WriteOp>) -> AppResult<()>;

    /// Maximum number of values one `in` filter may hold.
    fn max_in_values(&self) -> usize;

    /// Round trip to the backend. In-process stores are always reachable.
    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}
