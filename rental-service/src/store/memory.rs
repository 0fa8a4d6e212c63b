//! In-process store used by tests and the `--store memory` mode.

use super::{check_delete, check_transition, check_update, series_key, series_name, EntityStore, Filter, StoredDoc, WriteMode};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use rental_shared::{DocStatus, Document};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    docs: BTreeMap<(String, String), StoredDoc>,
    series: HashMap<String, i32>,
    writes: HashMap<(String, String), usize>,
    failing: HashSet<String>,
}

impl State {
    fn current(&self, doctype: &str, name: &str) -> Result<&StoredDoc, StoreError> {
        self.docs
            .get(&(doctype.to_string(), name.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                doctype: doctype.to_string(),
                name: name.to_string(),
            })
    }

    fn guard(&self, doctype: &str) -> Result<(), StoreError> {
        if self.failing.contains(doctype) {
            return Err(StoreError::Unavailable(format!("writes to {doctype} are failing")));
        }
        Ok(())
    }

    fn put(&mut self, doc: StoredDoc) {
        let key = (doc.doctype.clone(), doc.name.clone());
        *self.writes.entry(key.clone()).or_default() += 1;
        self.docs.insert(key, doc);
    }
}

/// Keeps every document in memory. Writes to a doctype can be made to fail,
/// and every committed write is counted per document.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent write to `doctype` fails with `StoreError::Unavailable`.
    pub async fn fail_writes<T: Document>(&self) {
        self.state.write().await.failing.insert(T::DOCTYPE.to_string());
    }

    pub async fn restore_writes(&self) {
        self.state.write().await.failing.clear();
    }

    /// Number of committed writes to one document, its insert included.
    pub async fn write_count<T: Document>(&self, name: &str) -> usize {
        self.state
            .read()
            .await
            .writes
            .get(&(T::DOCTYPE.to_string(), name.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch(&self, doctype: &str, name: &str) -> Result<StoredDoc, StoreError> {
        self.state.read().await.current(doctype, name).cloned()
    }

    async fn insert(&self, mut doc: StoredDoc, prefix: &str) -> Result<StoredDoc, StoreError> {
        let mut state = self.state.write().await;
        state.guard(&doc.doctype)?;

        if doc.name.is_empty() {
            let key = series_key(prefix, Utc::now());
            let sequence = state.series.entry(key.clone()).or_insert(0);
            *sequence += 1;
            doc.name = series_name(&key, *sequence);
        } else if state.docs.contains_key(&(doc.doctype.clone(), doc.name.clone())) {
            return Err(StoreError::Duplicate {
                doctype: doc.doctype,
                name: doc.name,
            });
        }

        doc.docstatus = DocStatus::Draft;
        state.put(doc.clone());
        Ok(doc)
    }

    async fn update(&self, mut doc: StoredDoc, mode: WriteMode) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.guard(&doc.doctype)?;
        let current = state.current(&doc.doctype, &doc.name)?;
        check_update(current, mode)?;
        doc.docstatus = current.docstatus;
        state.put(doc);
        Ok(())
    }

    async fn set_value(
        &self,
        doctype: &str,
        name: &str,
        field: &str,
        value: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.guard(doctype)?;
        let current = state.current(doctype, name)?;
        check_update(current, mode)?;
        let mut doc = current.clone();
        if let Value::Object(fields) = &mut doc.data {
            fields.insert(field.to_string(), value);
        }
        state.put(doc);
        Ok(())
    }

    async fn transition(&self, mut doc: StoredDoc, target: DocStatus) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.guard(&doc.doctype)?;
        check_transition(state.current(&doc.doctype, &doc.name)?, target)?;
        doc.docstatus = target;
        state.put(doc);
        Ok(())
    }

    async fn delete(&self, doctype: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.guard(doctype)?;
        check_delete(state.current(doctype, name)?)?;
        state.docs.remove(&(doctype.to_string(), name.to_string()));
        Ok(())
    }

    async fn list(&self, doctype: &str, filters: &[Filter]) -> Result<Vec<StoredDoc>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .docs
            .values()
            .filter(|doc| doc.doctype == doctype)
            .filter(|doc| filters.iter().all(|filter| filter.matches(doc)))
            .cloned()
            .collect())
    }
}
