//! Document store collaborator.
//!
//! The shop persists every record as a flat JSON document in one of five
//! collections. The store is injected behind [`DocumentStore`]; callers work
//! with typed records through [`Record`] and the helpers in this module, and
//! observe collections through [`Feed`], a live view of full snapshots.
//!
//! Two guarantees are required from any implementation: `update_if` must check
//! its preconditions and apply the write atomically, and `batch_write` must be
//! all-or-nothing.

pub mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::order::Order;
use crate::records::{Broadcast, Product, Promo, UserRecord};
use crate::types::DocKey;

/// field map of one stored document
pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Products,
    Orders,
    Users,
    Broadcasts,
    Promos,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Orders => "orders",
            Collection::Users => "users",
            Collection::Broadcasts => "broadcasts",
            Collection::Promos => "promos",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("document {key} not found in {collection}")]
    DocumentNotFound { collection: Collection, key: DocKey },

    #[error("precondition failed for {collection}/{key}")]
    PreconditionFailed { collection: Collection, key: DocKey },

    #[error("encoding error: {message}")]
    Encoding { message: String },

    #[error("batch rejected: {message}")]
    BatchRejected { message: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encoding {
            message: err.to_string(),
        }
    }
}

/// a document together with its storage key
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
    pub key: DocKey,
    pub fields: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    FieldEquals { field: String, value: Value },
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::FieldEquals { field, value } => doc.get(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SortOrder {
    #[default]
    Insertion,
    FieldDescending(String),
}

/// what a subscription or one-shot read selects
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order: SortOrder,
}

impl Query {
    /// every document, insertion order
    pub fn all() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter::FieldEquals {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn descending_by(mut self, field: &str) -> Self {
        self.order = SortOrder::FieldDescending(field.to_string());
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(doc))
    }

    /// filter then order a snapshot that is already in insertion order
    pub fn apply<'a>(&self, docs: impl IntoIterator<Item = &'a StoredDoc>) -> Vec<StoredDoc> {
        let mut selected: Vec<StoredDoc> = docs
            .into_iter()
            .filter(|doc| self.matches(&doc.fields))
            .cloned()
            .collect();
        if let SortOrder::FieldDescending(field) = &self.order {
            selected.sort_by(|a, b| {
                let a = SortKey::of(a.fields.get(field));
                let b = SortKey::of(b.fields.get(field));
                b.cmp_total(&a)
            });
        }
        selected
    }
}

/// total ordering over field values: missing < numbers < text < timestamps
enum SortKey<'a> {
    Missing,
    Number(f64),
    Text(&'a str),
    Instant(DateTime<Utc>),
}

impl<'a> SortKey<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_f64().map_or(SortKey::Missing, SortKey::Number),
            Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(at) => SortKey::Instant(at.with_timezone(&Utc)),
                Err(_) => SortKey::Text(s),
            },
            _ => SortKey::Missing,
        }
    }

    fn class(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Number(_) => 1,
            SortKey::Text(_) => 2,
            SortKey::Instant(_) => 3,
        }
    }

    fn cmp_total(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Instant(a), SortKey::Instant(b)) => a.cmp(b),
            _ => self.class().cmp(&other.class()),
        }
    }
}

/// condition checked atomically with an update
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// array field has exactly `len` elements (missing counts as empty)
    ArrayLen { field: String, len: usize },
    FieldEquals { field: String, value: Value },
}

impl Precondition {
    pub fn array_len(field: &str, len: usize) -> Self {
        Precondition::ArrayLen {
            field: field.to_string(),
            len,
        }
    }

    pub fn field_equals(field: &str, value: impl Into<Value>) -> Self {
        Precondition::FieldEquals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn holds(&self, doc: &Document) -> bool {
        match self {
            Precondition::ArrayLen { field, len } => {
                let actual = match doc.get(field) {
                    None | Some(Value::Null) => 0,
                    Some(Value::Array(items)) => items.len(),
                    Some(_) => return false,
                };
                actual == *len
            }
            Precondition::FieldEquals { field, value } => doc.get(field) == Some(value),
        }
    }
}

/// one write of an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Add {
        collection: Collection,
        fields: Document,
    },
    Update {
        collection: Collection,
        key: DocKey,
        fields: Document,
        preconditions: Vec<Precondition>,
    },
}

pub trait DocumentStore: Send + Sync {
    /// insert under a generated key
    fn add(&self, collection: Collection, fields: Document) -> Result<DocKey, StoreError>;

    /// create or replace under a caller-chosen key
    fn set(&self, collection: Collection, key: &DocKey, fields: Document) -> Result<(), StoreError>;

    fn get(&self, collection: Collection, key: &DocKey) -> Result<Option<Document>, StoreError>;

    /// shallow merge of `fields` into an existing document
    fn update(&self, collection: Collection, key: &DocKey, fields: Document) -> Result<(), StoreError>;

    /// merge only if every precondition holds, atomically
    fn update_if(
        &self,
        collection: Collection,
        key: &DocKey,
        fields: Document,
        preconditions: &[Precondition],
    ) -> Result<(), StoreError>;

    /// first document, in insertion order, whose `field` equals `value`
    fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<StoredDoc>, StoreError>;

    /// apply all writes or none; returns the keys generated for `Add` ops
    fn batch_write(&self, ops: Vec<WriteOp>) -> Result<Vec<DocKey>, StoreError>;

    fn query(&self, collection: Collection, query: &Query) -> Result<Vec<StoredDoc>, StoreError>;

    /// live full snapshots of the documents selected by `query`
    fn subscribe(
        &self,
        collection: Collection,
        query: Query,
    ) -> Result<watch::Receiver<Vec<StoredDoc>>, StoreError>;
}

/// typed record living in a fixed collection
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;
}

impl Record for Order {
    const COLLECTION: Collection = Collection::Orders;
}

impl Record for UserRecord {
    const COLLECTION: Collection = Collection::Users;
}

impl Record for Broadcast {
    const COLLECTION: Collection = Collection::Broadcasts;
}

impl Record for Promo {
    const COLLECTION: Collection = Collection::Promos;
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Encoding {
            message: format!("expected an object, got {}", other),
        }),
    }
}

pub fn from_document<T: DeserializeOwned>(fields: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// a decoded record and its storage key
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub key: DocKey,
    pub record: T,
}

fn decode_snapshot<T: Record>(docs: &[StoredDoc]) -> Vec<Stored<T>> {
    docs.iter()
        .filter_map(|doc| match from_document::<T>(doc.fields.clone()) {
            Ok(record) => Some(Stored {
                key: doc.key.clone(),
                record,
            }),
            Err(err) => {
                warn!(
                    collection = %T::COLLECTION,
                    key = %doc.key,
                    error = %err,
                    "skipping undecodable document"
                );
                None
            }
        })
        .collect()
}

/// live typed view over a subscription
pub struct Feed<T> {
    receiver: watch::Receiver<Vec<StoredDoc>>,
    _record: std::marker::PhantomData<T>,
}

impl<T: Record> Feed<T> {
    pub fn open(store: &dyn DocumentStore, query: Query) -> Result<Self, StoreError> {
        Ok(Self {
            receiver: store.subscribe(T::COLLECTION, query)?,
            _record: std::marker::PhantomData,
        })
    }

    /// latest snapshot
    pub fn current(&self) -> Vec<Stored<T>> {
        decode_snapshot(&self.receiver.borrow())
    }

    /// wait for the next snapshot
    pub async fn next(&mut self) -> Result<Vec<Stored<T>>, StoreError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| StoreError::Unavailable {
                message: format!("{} feed closed", T::COLLECTION),
            })?;
        Ok(decode_snapshot(&self.receiver.borrow_and_update()))
    }
}

pub fn load<T: Record>(store: &dyn DocumentStore, key: &DocKey) -> Result<Option<T>, StoreError> {
    store
        .get(T::COLLECTION, key)?
        .map(from_document)
        .transpose()
}

pub fn find<T: Record>(
    store: &dyn DocumentStore,
    field: &str,
    value: impl Into<Value>,
) -> Result<Option<Stored<T>>, StoreError> {
    match store.find_one(T::COLLECTION, field, &value.into())? {
        Some(doc) => Ok(Some(Stored {
            key: doc.key,
            record: from_document(doc.fields)?,
        })),
        None => Ok(None),
    }
}

/// one-shot typed read; undecodable documents are skipped
pub fn list<T: Record>(store: &dyn DocumentStore, query: &Query) -> Result<Vec<Stored<T>>, StoreError> {
    Ok(decode_snapshot(&store.query(T::COLLECTION, query)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(key: &str, fields: Value) -> StoredDoc {
        StoredDoc {
            key: DocKey::from(key),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_query_filters_and_orders() {
        let docs = vec![
            doc("a", json!({"role": "collector", "at": "2024-11-14T03:00:00Z"})),
            doc("b", json!({"role": "consumer", "at": "2024-11-15T03:00:00Z"})),
            doc("c", json!({"role": "collector", "at": "2024-11-14T03:00:00.5Z"})),
        ];
        let collectors = Query::all().where_eq("role", "collector").apply(&docs);
        assert_eq!(collectors.len(), 2);

        let newest = Query::all().descending_by("at").apply(&docs);
        let keys: Vec<_> = newest.iter().map(|d| d.key.as_str()).collect();
        // fractional seconds compare as instants, not text
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_descending_tolerates_mixed_values() {
        let docs = vec![
            doc("text", json!({"at": "14 November 2024"})),
            doc("none", json!({})),
            doc("time", json!({"at": "2024-11-14T03:00:00Z"})),
            doc("num", json!({"at": 3})),
        ];
        let keys: Vec<_> = Query::all()
            .descending_by("at")
            .apply(&docs)
            .into_iter()
            .map(|d| d.key.to_string())
            .collect();
        assert_eq!(keys, vec!["time", "text", "num", "none"]);
    }

    #[test]
    fn test_preconditions() {
        let fields = json!({"payments": [1, 2], "status": "delivered"});
        let fields = fields.as_object().unwrap();
        assert!(Precondition::array_len("payments", 2).holds(fields));
        assert!(!Precondition::array_len("payments", 1).holds(fields));
        assert!(Precondition::array_len("missing", 0).holds(fields));
        assert!(Precondition::field_equals("status", "delivered").holds(fields));
        assert!(!Precondition::field_equals("status", "paid_off").holds(fields));
    }

    #[test]
    fn test_document_codec() {
        let promo = Promo {
            id: "PROMO-1".to_string(),
            kind: crate::records::PromoKind::Video,
            url: "https://video/1".to_string(),
        };
        let fields = to_document(&promo).unwrap();
        assert_eq!(fields["kind"], "video");
        let back: Promo = from_document(fields).unwrap();
        assert_eq!(back, promo);

        assert!(matches!(to_document(&3), Err(StoreError::Encoding { .. })));
    }
}
