//! Document-store contract consumed by the studylink core
//!
//! The backend is a path-addressed document database with live queries:
//! documents are JSON values stored at `collection/id` (possibly nested,
//! e.g. `resources/{id}/comments/{id}`), queries filter a single collection,
//! and a subscription re-delivers the full result set of its query after
//! every mutation that affects it. The core is agnostic to the concrete
//! transport; anything implementing [`DocumentStore`] can back it.

pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Error;

/// A document returned from the store
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Full path of the document, e.g. `connections/alice_bob`
    pub path: String,
    /// Last path segment
    pub id: String,
    /// Document contents
    pub data: Value,
}

impl Document {
    /// Deserialize the document contents into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Read a string field, if present
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Sort direction for ordered queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Filter comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single field filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Ordering applied to a query's results
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub order: SortOrder,
}

/// A filtered query against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    /// Create a query over a collection
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    /// Keep documents whose field equals the value
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Keep documents whose field differs from the value
    pub fn neq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Neq, value)
    }

    /// Keep documents whose field is greater than the value
    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gt, value)
    }

    /// Keep documents whose field is greater than or equal to the value
    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gte, value)
    }

    /// Keep documents whose field is less than the value
    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lt, value)
    }

    /// Keep documents whose field is less than or equal to the value
    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lte, value)
    }

    /// Order results by a field
    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            order,
        });
        self
    }

    /// Cap the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A field value in a write, either a plain value or a server-side sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum WriteValue {
    /// Plain JSON value
    Value(Value),
    /// Atomically add to the current numeric value (0 when absent)
    Increment(i64),
    /// Placeholder resolved to the write time on the server
    ServerTimestamp,
}

/// Builder for the fields of a `set` or `update` write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, WriteValue)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a plain value
    pub fn value(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.push((field.to_string(), WriteValue::Value(value.into())));
        self
    }

    /// Set a field from any serializable value
    pub fn serialized<T: Serialize>(mut self, field: &str, value: &T) -> Result<Self, Error> {
        let json = serde_json::to_value(value)?;
        self.0.push((field.to_string(), WriteValue::Value(json)));
        Ok(self)
    }

    /// Atomically add `n` to a numeric field
    pub fn increment(mut self, field: &str, n: i64) -> Self {
        self.0.push((field.to_string(), WriteValue::Increment(n)));
        self
    }

    /// Set a field to the server-resolved write timestamp
    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.0.push((field.to_string(), WriteValue::ServerTimestamp));
        self
    }

    /// Iterate over the collected field writes
    pub fn iter(&self) -> impl Iterator<Item = &(String, WriteValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sink receiving the full result set of a subscribed query on every change
pub type SnapshotSender = mpsc::UnboundedSender<Vec<Document>>;

/// Handle to a live subscription
///
/// Detaching is idempotent: calling [`Subscription::detach`] any number of
/// times, or dropping an already-detached handle, is safe and never panics.
/// Screen teardown order across dependent effects is not guaranteed, so the
/// handle must tolerate being torn down more than once.
pub struct Subscription {
    id: Uuid,
    detach_fn: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Create a subscription handle around a detach action
    pub fn new(id: Uuid, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            detach_fn: Mutex::new(Some(Box::new(detach))),
        }
    }

    /// The subscription identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Detach from the store; a no-op when already detached
    pub fn detach(&self) {
        if let Ok(mut guard) = self.detach_fn.lock() {
            if let Some(detach) = guard.take() {
                detach();
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Path-addressed document database with live queries
///
/// This is the only surface the studylink core needs from its backend:
/// CRUD by path, one-shot filtered listing, live subscription, an atomic
/// counter mutation, a server-resolved timestamp and binary blob removal.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document, `None` when absent
    async fn get(&self, path: &str) -> Result<Option<Document>, Error>;

    /// Write a document; with `merge` the fields are laid over any existing
    /// contents, otherwise the document is replaced
    async fn set(&self, path: &str, fields: Fields, merge: bool) -> Result<(), Error>;

    /// Patch fields of an existing document; `NotFound` when absent
    async fn update(&self, path: &str, fields: Fields) -> Result<(), Error>;

    /// Delete a document; deleting an absent document is a no-op
    async fn delete(&self, path: &str) -> Result<(), Error>;

    /// One-shot evaluation of a query
    async fn list(&self, query: &Query) -> Result<Vec<Document>, Error>;

    /// Live-subscribe to a query
    ///
    /// The current result set is delivered immediately, then again after
    /// every mutation affecting it. Whole snapshots, never diffs: callers
    /// must not rely on any ordering between independent subscriptions.
    async fn subscribe(&self, query: Query, sink: SnapshotSender) -> Result<Subscription, Error>;

    /// Remove a binary blob
    async fn delete_blob(&self, path: &str) -> Result<(), Error>;
}

/// Parent collection of a document path, e.g. `resources/r1/comments` for
/// `resources/r1/comments/c1`
pub fn parent_collection(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of a document path
pub fn document_id(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}
