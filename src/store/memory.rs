use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

use super::{Collection, Document, DocumentStore, Precondition, Query, StoreError, StoredDoc, WriteOp};
use crate::types::DocKey;

struct Subscriber {
    collection: Collection,
    query: Query,
    sender: watch::Sender<Vec<StoredDoc>>,
}

#[derive(Default)]
struct Inner {
    next_key: u64,
    collections: BTreeMap<Collection, Vec<StoredDoc>>,
    subscribers: Vec<Subscriber>,
    unavailable: Option<String>,
}

impl Inner {
    fn docs(&self, collection: Collection) -> &[StoredDoc] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn fresh_key(&mut self) -> DocKey {
        self.next_key += 1;
        DocKey::new(format!("doc-{:06}", self.next_key))
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        match &self.unavailable {
            Some(message) => Err(StoreError::Unavailable {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn notify(&mut self, touched: &[Collection]) {
        self.subscribers.retain(|sub| sub.sender.receiver_count() > 0);
        for sub in &self.subscribers {
            if touched.contains(&sub.collection) {
                let docs = self.collections.get(&sub.collection).map(Vec::as_slice).unwrap_or(&[]);
                sub.sender.send_replace(sub.query.apply(docs));
            }
        }
    }
}

fn insert(
    collections: &mut BTreeMap<Collection, Vec<StoredDoc>>,
    collection: Collection,
    key: DocKey,
    fields: Document,
) {
    let docs = collections.entry(collection).or_default();
    match docs.iter_mut().find(|doc| doc.key == key) {
        Some(existing) => existing.fields = fields,
        None => docs.push(StoredDoc { key, fields }),
    }
}

fn merge(
    collections: &mut BTreeMap<Collection, Vec<StoredDoc>>,
    collection: Collection,
    key: &DocKey,
    fields: Document,
    preconditions: &[Precondition],
) -> Result<(), StoreError> {
    let doc = collections
        .get_mut(&collection)
        .and_then(|docs| docs.iter_mut().find(|doc| &doc.key == key))
        .ok_or_else(|| StoreError::DocumentNotFound {
            collection,
            key: key.clone(),
        })?;
    if !preconditions.iter().all(|p| p.holds(&doc.fields)) {
        return Err(StoreError::PreconditionFailed {
            collection,
            key: key.clone(),
        });
    }
    for (field, value) in fields {
        doc.fields.insert(field, value);
    }
    Ok(())
}

/// in-process document store; every operation takes one lock, so conditional
/// updates and batches are atomic
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Unavailable {
            message: "store lock poisoned".to_string(),
        })
    }

    /// make every write fail with `Unavailable` until cleared with `None`
    pub fn set_unavailable(&self, message: Option<&str>) -> Result<(), StoreError> {
        self.lock()?.unavailable = message.map(str::to_string);
        Ok(())
    }

    pub fn len(&self, collection: Collection) -> Result<usize, StoreError> {
        Ok(self.lock()?.docs(collection).len())
    }

    pub fn is_empty(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.len(collection)? == 0)
    }
}

impl DocumentStore for MemoryStore {
    fn add(&self, collection: Collection, fields: Document) -> Result<DocKey, StoreError> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;
        let key = inner.fresh_key();
        insert(&mut inner.collections, collection, key.clone(), fields);
        inner.notify(&[collection]);
        debug!(%collection, %key, "document added");
        Ok(key)
    }

    fn set(&self, collection: Collection, key: &DocKey, fields: Document) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;
        insert(&mut inner.collections, collection, key.clone(), fields);
        inner.notify(&[collection]);
        debug!(%collection, %key, "document set");
        Ok(())
    }

    fn get(&self, collection: Collection, key: &DocKey) -> Result<Option<Document>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .docs(collection)
            .iter()
            .find(|doc| &doc.key == key)
            .map(|doc| doc.fields.clone()))
    }

    fn update(&self, collection: Collection, key: &DocKey, fields: Document) -> Result<(), StoreError> {
        self.update_if(collection, key, fields, &[])
    }

    fn update_if(
        &self,
        collection: Collection,
        key: &DocKey,
        fields: Document,
        preconditions: &[Precondition],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;
        merge(&mut inner.collections, collection, key, fields, preconditions)?;
        inner.notify(&[collection]);
        debug!(%collection, %key, "document updated");
        Ok(())
    }

    fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<StoredDoc>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .docs(collection)
            .iter()
            .find(|doc| doc.fields.get(field) == Some(value))
            .cloned())
    }

    fn batch_write(&self, ops: Vec<WriteOp>) -> Result<Vec<DocKey>, StoreError> {
        let mut inner = self.lock()?;
        inner.ensure_available()?;

        // apply to a scratch copy, swap in only if every op succeeded
        let mut scratch = inner.collections.clone();
        let mut next_key = inner.next_key;
        let mut added = Vec::new();
        let mut touched = Vec::new();
        for op in ops {
            match op {
                WriteOp::Add { collection, fields } => {
                    next_key += 1;
                    let key = DocKey::new(format!("doc-{:06}", next_key));
                    insert(&mut scratch, collection, key.clone(), fields);
                    added.push(key);
                    touched.push(collection);
                }
                WriteOp::Update {
                    collection,
                    key,
                    fields,
                    preconditions,
                } => {
                    merge(&mut scratch, collection, &key, fields, &preconditions).map_err(|err| match err {
                        StoreError::PreconditionFailed { .. } => StoreError::BatchRejected {
                            message: err.to_string(),
                        },
                        other => other,
                    })?;
                    touched.push(collection);
                }
            }
        }

        inner.collections = scratch;
        inner.next_key = next_key;
        touched.dedup();
        inner.notify(&touched);
        debug!(writes = touched.len(), added = added.len(), "batch committed");
        Ok(added)
    }

    fn query(&self, collection: Collection, query: &Query) -> Result<Vec<StoredDoc>, StoreError> {
        let inner = self.lock()?;
        Ok(query.apply(inner.docs(collection)))
    }

    fn subscribe(
        &self,
        collection: Collection,
        query: Query,
    ) -> Result<watch::Receiver<Vec<StoredDoc>>, StoreError> {
        let mut inner = self.lock()?;
        let (sender, receiver) = watch::channel(query.apply(inner.docs(collection)));
        inner.subscribers.push(Subscriber {
            collection,
            query,
            sender,
        });
        Ok(receiver)
    }
}
