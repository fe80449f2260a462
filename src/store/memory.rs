//! In-memory implementation of the document-store contract
//!
//! Backs the core in tests and offline usage: documents live in a path-keyed
//! map, live queries are re-evaluated and re-delivered as whole snapshots
//! after every mutation of their collection, and server timestamps resolve
//! to the local clock at write time. Fault injection hooks exercise the
//! best-effort error paths (failed profile reads, failed blob deletes).

use chrono::Utc;
use log::debug;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::Error;
use crate::store::{
    parent_collection, Document, DocumentStore, Fields, Filter, FilterOp, Query, SnapshotSender,
    SortOrder, Subscription, WriteValue,
};

struct SubEntry {
    query: Query,
    sink: SnapshotSender,
}

struct Inner {
    docs: RwLock<BTreeMap<String, Value>>,
    subs: Mutex<HashMap<Uuid, SubEntry>>,
    blobs: Mutex<HashSet<String>>,
    fail_read_prefixes: Mutex<Vec<String>>,
    fail_blob_deletes: AtomicBool,
}

/// In-process document store with live snapshot fan-out
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                docs: RwLock::new(BTreeMap::new()),
                subs: Mutex::new(HashMap::new()),
                blobs: Mutex::new(HashSet::new()),
                fail_read_prefixes: Mutex::new(Vec::new()),
                fail_blob_deletes: AtomicBool::new(false),
            }),
        }
    }

    /// Register a binary blob so a later `delete_blob` has something to remove
    pub fn put_blob(&self, path: &str) {
        if let Ok(mut blobs) = self.inner.blobs.lock() {
            blobs.insert(path.to_string());
        }
    }

    /// Whether a blob is currently present
    pub fn has_blob(&self, path: &str) -> bool {
        self.inner
            .blobs
            .lock()
            .map(|blobs| blobs.contains(path))
            .unwrap_or(false)
    }

    /// Make every `get` whose path starts with the prefix fail transiently
    pub fn fail_reads_matching(&self, prefix: &str) {
        if let Ok(mut prefixes) = self.inner.fail_read_prefixes.lock() {
            prefixes.push(prefix.to_string());
        }
    }

    /// Remove all injected read failures
    pub fn clear_read_failures(&self) {
        if let Ok(mut prefixes) = self.inner.fail_read_prefixes.lock() {
            prefixes.clear();
        }
    }

    /// Make every `delete_blob` fail transiently
    pub fn fail_blob_deletes(&self, fail: bool) {
        self.inner
            .fail_blob_deletes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of live subscriptions currently attached
    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.lock().map(|subs| subs.len()).unwrap_or(0)
    }

    fn read_should_fail(&self, path: &str) -> bool {
        self.inner
            .fail_read_prefixes
            .lock()
            .map(|prefixes| prefixes.iter().any(|p| path.starts_with(p.as_str())))
            .unwrap_or(false)
    }

    /// Apply a mutation under the write lock, then fan out fresh snapshots
    /// to every subscription watching the mutated collection.
    async fn commit<F>(&self, path: &str, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BTreeMap<String, Value>) -> Result<(), Error>,
    {
        let collection = parent_collection(path).to_string();
        let notifications = {
            let mut docs = self.inner.docs.write().await;
            mutate(&mut docs)?;
            self.inner.pending_notifications(&docs, &collection)
        };
        self.inner.dispatch(notifications);
        Ok(())
    }
}

impl Inner {
    /// Collect (subscription id, sink, snapshot) for a mutated collection
    fn pending_notifications(
        &self,
        docs: &BTreeMap<String, Value>,
        collection: &str,
    ) -> Vec<(Uuid, SnapshotSender, Vec<Document>)> {
        let Ok(subs) = self.subs.lock() else {
            return Vec::new();
        };
        subs.iter()
            .filter(|(_, entry)| entry.query.collection == collection)
            .map(|(id, entry)| (*id, entry.sink.clone(), evaluate(&entry.query, docs)))
            .collect()
    }

    /// Deliver snapshots, dropping subscriptions whose receiver is gone
    fn dispatch(&self, notifications: Vec<(Uuid, SnapshotSender, Vec<Document>)>) {
        for (id, sink, snapshot) in notifications {
            if sink.send(snapshot).is_err() {
                debug!("dropping subscription {id}: receiver went away");
                if let Ok(mut subs) = self.subs.lock() {
                    subs.remove(&id);
                }
            }
        }
    }
}

/// Whether a path is a direct child document of the collection
fn in_collection(path: &str, collection: &str) -> bool {
    match path.strip_prefix(collection) {
        Some(rest) => {
            rest.starts_with('/') && !rest[1..].is_empty() && !rest[1..].contains('/')
        }
        None => false,
    }
}

/// Loose ordering over JSON values: numbers, strings and bools compare
/// within their own type; everything else compares equal.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn filter_matches(filter: &Filter, data: &Value) -> bool {
    let Some(actual) = data.get(&filter.field) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => actual == &filter.value,
        FilterOp::Neq => actual != &filter.value,
        FilterOp::Gt => cmp_values(actual, &filter.value) == Ordering::Greater,
        FilterOp::Gte => cmp_values(actual, &filter.value) != Ordering::Less,
        FilterOp::Lt => cmp_values(actual, &filter.value) == Ordering::Less,
        FilterOp::Lte => cmp_values(actual, &filter.value) != Ordering::Greater,
    }
}

/// Evaluate a query against the current document map
fn evaluate(query: &Query, docs: &BTreeMap<String, Value>) -> Vec<Document> {
    let mut results: Vec<Document> = docs
        .iter()
        .filter(|(path, _)| in_collection(path, &query.collection))
        .filter(|(_, data)| query.filters.iter().all(|f| filter_matches(f, data)))
        .map(|(path, data)| Document {
            path: path.clone(),
            id: crate::store::document_id(path).to_string(),
            data: data.clone(),
        })
        .collect();

    if let Some(order) = &query.order_by {
        results.sort_by(|a, b| {
            let ord = match (a.data.get(&order.field), b.data.get(&order.field)) {
                (Some(x), Some(y)) => cmp_values(x, y),
                // Documents missing the sort field go last
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            match order.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }

    if let Some(limit) = query.limit {
        results.truncate(limit);
    }
    results
}

/// Lay `fields` over a base object, resolving sentinels against it
fn apply_fields(base: &mut Map<String, Value>, fields: &Fields) {
    for (field, write) in fields.iter() {
        let resolved = match write {
            WriteValue::Value(value) => value.clone(),
            WriteValue::Increment(n) => {
                let current = base.get(field).and_then(Value::as_i64).unwrap_or(0);
                Value::from(current + n)
            }
            WriteValue::ServerTimestamp => Value::from(Utc::now().to_rfc3339()),
        };
        base.insert(field.clone(), resolved);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, Error> {
        if self.read_should_fail(path) {
            return Err(Error::transient(format!("injected read failure: {path}")));
        }
        let docs = self.inner.docs.read().await;
        Ok(docs.get(path).map(|data| Document {
            path: path.to_string(),
            id: crate::store::document_id(path).to_string(),
            data: data.clone(),
        }))
    }

    async fn set(&self, path: &str, fields: Fields, merge: bool) -> Result<(), Error> {
        self.commit(path, |docs| {
            let mut base = if merge {
                match docs.get(path).and_then(Value::as_object) {
                    Some(existing) => existing.clone(),
                    None => Map::new(),
                }
            } else {
                Map::new()
            };
            apply_fields(&mut base, &fields);
            docs.insert(path.to_string(), Value::Object(base));
            Ok(())
        })
        .await
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), Error> {
        self.commit(path, |docs| {
            let Some(existing) = docs.get(path) else {
                return Err(Error::not_found(path));
            };
            let mut base = existing.as_object().cloned().unwrap_or_default();
            apply_fields(&mut base, &fields);
            docs.insert(path.to_string(), Value::Object(base));
            Ok(())
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        self.commit(path, |docs| {
            docs.remove(path);
            Ok(())
        })
        .await
    }

    async fn list(&self, query: &Query) -> Result<Vec<Document>, Error> {
        let docs = self.inner.docs.read().await;
        Ok(evaluate(query, &docs))
    }

    async fn subscribe(&self, query: Query, sink: SnapshotSender) -> Result<Subscription, Error> {
        let id = Uuid::new_v4();
        let initial = {
            let docs = self.inner.docs.read().await;
            evaluate(&query, &docs)
        };
        if let Ok(mut subs) = self.inner.subs.lock() {
            subs.insert(
                id,
                SubEntry {
                    query,
                    sink: sink.clone(),
                },
            );
        }
        // Deliver the current result set right away; later snapshots follow
        // from mutations. A dead receiver is cleaned up on first dispatch.
        let _ = sink.send(initial);

        let inner = self.inner.clone();
        Ok(Subscription::new(id, move || {
            if let Ok(mut subs) = inner.subs.lock() {
                subs.remove(&id);
            }
        }))
    }

    async fn delete_blob(&self, path: &str) -> Result<(), Error> {
        if self
            .inner
            .fail_blob_deletes
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::transient(format!("injected blob failure: {path}")));
        }
        if let Ok(mut blobs) = self.inner.blobs.lock() {
            blobs.remove(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_set_merge_and_sentinels() {
        let store = MemoryStore::new();
        store
            .set(
                "resources/r1",
                Fields::new()
                    .value("title", "algebra notes")
                    .value("likeCount", 0)
                    .server_timestamp("createdAt"),
                false,
            )
            .await
            .unwrap();

        store
            .update("resources/r1", Fields::new().increment("likeCount", 1))
            .await
            .unwrap();
        store
            .update("resources/r1", Fields::new().increment("likeCount", 1))
            .await
            .unwrap();
        store
            .update("resources/r1", Fields::new().increment("likeCount", -1))
            .await
            .unwrap();

        let doc = store.get("resources/r1").await.unwrap().unwrap();
        assert_eq!(doc.data["likeCount"], json!(1));
        assert_eq!(doc.data["title"], json!("algebra notes"));
        assert!(doc.data["createdAt"].is_string());

        // Merge keeps fields that the write does not name
        store
            .set("resources/r1", Fields::new().value("title", "renamed"), true)
            .await
            .unwrap();
        let doc = store.get("resources/r1").await.unwrap().unwrap();
        assert_eq!(doc.data["title"], json!("renamed"));
        assert_eq!(doc.data["likeCount"], json!(1));

        // Replace drops them
        store
            .set("resources/r1", Fields::new().value("title", "replaced"), false)
            .await
            .unwrap();
        let doc = store.get("resources/r1").await.unwrap().unwrap();
        assert!(doc.data.get("likeCount").is_none());
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("resources/missing", Fields::new().value("title", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_order_and_limit() {
        let store = MemoryStore::new();
        for (id, status, at) in [
            ("a_t", "pending", "2024-01-01T00:00:00Z"),
            ("b_t", "accepted", "2024-01-02T00:00:00Z"),
            ("c_t", "accepted", "2024-01-03T00:00:00Z"),
            ("c_u", "accepted", "2024-01-04T00:00:00Z"),
        ] {
            store
                .set(
                    &format!("connections/{id}"),
                    Fields::new()
                        .value("tutorId", "t")
                        .value("status", status)
                        .value("createdAt", at),
                    false,
                )
                .await
                .unwrap();
        }
        // Reassign c_u to another tutor so the tutorId filter excludes it
        store
            .set(
                "connections/c_u",
                Fields::new().value("tutorId", "u"),
                true,
            )
            .await
            .unwrap();

        let query = Query::collection("connections")
            .eq("tutorId", "t")
            .eq("status", "accepted")
            .order_by("createdAt", SortOrder::Descending)
            .limit(1);
        let docs = store.list(&query).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "c_t");

        // Nested collections do not leak into their parent
        store
            .set(
                "connections/a_t/notes/n1",
                Fields::new().value("tutorId", "t").value("status", "accepted"),
                false,
            )
            .await
            .unwrap();
        let all = store
            .list(&Query::collection("connections").eq("tutorId", "t"))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_and_updated_snapshots() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = store
            .subscribe(
                Query::collection("chat_index").eq("ownerId", "tutor-1"),
                tx,
            )
            .await
            .unwrap();

        let initial = rx.recv().await.unwrap();
        assert!(initial.is_empty());

        store
            .set(
                "chat_index/tutor-1_student-1",
                Fields::new()
                    .value("ownerId", "tutor-1")
                    .value("peerId", "student-1"),
                false,
            )
            .await
            .unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].str_field("peerId"), Some("student-1"));

        // A mutation in an unrelated collection produces no snapshot
        store
            .set("users/u1", Fields::new().value("name", "A"), false)
            .await
            .unwrap();

        sub.detach();
        assert_eq!(store.subscriber_count(), 0);
        store
            .delete("chat_index/tutor-1_student-1")
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store
            .set("users/u1", Fields::new().value("name", "A"), false)
            .await
            .unwrap();

        store.fail_reads_matching("users/");
        assert!(matches!(
            store.get("users/u1").await,
            Err(Error::Transient(_))
        ));
        store.clear_read_failures();
        assert!(store.get("users/u1").await.unwrap().is_some());

        store.put_blob("uploads/v1.mp4");
        store.fail_blob_deletes(true);
        assert!(matches!(
            store.delete_blob("uploads/v1.mp4").await,
            Err(Error::Transient(_))
        ));
        assert!(store.has_blob("uploads/v1.mp4"));
        store.fail_blob_deletes(false);
        store.delete_blob("uploads/v1.mp4").await.unwrap();
        assert!(!store.has_blob("uploads/v1.mp4"));
    }
}
