//! Document store abstraction.
//!
//! Records are schemaless JSON objects grouped into named collections. The store assigns
//! ids on creation and resolves [`FieldValue::ServerTimestamp`] against its own clock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// A stored record: its id plus its fields, serialized flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// A value to be written into a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's current time when the write is applied.
    ServerTimestamp,
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(Value::String(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Value::String(value.to_string()))
    }
}

/// Fields of a write. Fields not listed are left untouched by update and merge writes.
pub type WriteFields = BTreeMap<String, FieldValue>;

/// Sort direction of an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Ordering of a query. Ties are broken by document id in the same direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }

    pub fn new(field: &str, direction: Direction) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }
}

/// Position of a record within an ordered query; results resume strictly after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Ordering field value of the record, `Null` for id-ordered queries
    pub value: Value,
    pub id: String,
}

/// A query over a single collection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub order_by: Option<OrderBy>,
    pub where_eq: Option<(String, Value)>,
    pub limit: Option<u32>,
    pub start_after: Option<Position>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.where_eq = Some((field.to_string(), value.into()));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, position: Position) -> Self {
        self.start_after = Some(position);
        self
    }
}

/// Errors raised by a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored document is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("invalid field name: {0:?}")]
    InvalidField(String),
    #[error("unsupported value for {0}")]
    UnsupportedValue(String),
}

/// Narrow interface over the backing document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run an ordered and optionally filtered query.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Fetch a document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create a document and return its generated id.
    async fn add(&self, collection: &str, fields: WriteFields) -> Result<String, StoreError>;

    /// Update listed fields of an existing document. Fails with `NotFound` if absent.
    async fn update(&self, collection: &str, id: &str, fields: WriteFields)
        -> Result<(), StoreError>;

    /// Merge listed fields into a document, creating it if absent.
    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<(), StoreError>;

    /// Delete a document. Fails with `NotFound` if absent.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Apply a write onto existing fields, resolving server timestamps to `now`.
pub fn apply_write(target: &mut Fields, write: WriteFields, now: &str) {
    for (key, value) in write {
        let value = match value {
            FieldValue::Value(v) => v,
            FieldValue::ServerTimestamp => Value::String(now.to_string()),
        };
        target.insert(key, value);
    }
}
