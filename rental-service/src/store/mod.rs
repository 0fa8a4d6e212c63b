//! Document store boundary.
//!
//! The workflow only needs load, insert, full save, field-level update,
//! submit/cancel, delete and a filtered list. `EntityStore` is the untyped
//! contract each backend implements; `DocStore` layers the typed
//! [`Document`] API on top of it.

pub mod memory;
pub mod postgres;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rental_shared::{DocStatus, Document};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// How a write treats a document that is already submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Submitted documents are read-only.
    Normal,
    /// Write back onto a submitted document. Cancelled documents stay read-only.
    AfterSubmit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
    pub doctype: String,
    pub name: String,
    pub docstatus: DocStatus,
    pub data: Value,
}

impl StoredDoc {
    pub fn encode<T: Document>(doc: &T) -> Result<Self, StoreError> {
        Ok(Self {
            doctype: T::DOCTYPE.to_string(),
            name: doc.name().to_string(),
            docstatus: doc.docstatus(),
            data: serde_json::to_value(doc)?,
        })
    }

    pub fn decode<T: Document>(self) -> Result<T, StoreError> {
        let mut doc: T = serde_json::from_value(self.data)?;
        doc.set_name(self.name);
        doc.set_docstatus(self.docstatus);
        Ok(doc)
    }

    fn field(&self, field: &str) -> Value {
        match field {
            "name" => Value::String(self.name.clone()),
            "docstatus" => serde_json::to_value(self.docstatus).unwrap_or(Value::Null),
            other => self.data.get(other).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Predicate on a top-level field of a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    NotIn(String, Vec<Value>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Serialize) -> Self {
        Filter::Eq(field.to_string(), to_filter_value(value))
    }

    pub fn ne(field: &str, value: impl Serialize) -> Self {
        Filter::Ne(field.to_string(), to_filter_value(value))
    }

    pub fn not_in<T: Serialize>(field: &str, values: &[T]) -> Self {
        Filter::NotIn(field.to_string(), values.iter().map(|value| to_filter_value(value)).collect())
    }

    pub fn matches(&self, doc: &StoredDoc) -> bool {
        match self {
            Filter::Eq(field, value) => doc.field(field) == *value,
            Filter::Ne(field, value) => doc.field(field) != *value,
            Filter::NotIn(field, values) => {
                let actual = doc.field(field);
                !values.contains(&actual)
            }
        }
    }
}

fn to_filter_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn fetch(&self, doctype: &str, name: &str) -> Result<StoredDoc, StoreError>;

    /// Persists a new draft. An empty name is replaced from the naming series
    /// for `prefix`.
    async fn insert(&self, doc: StoredDoc, prefix: &str) -> Result<StoredDoc, StoreError>;

    /// Full save. The stored docstatus is kept; use `transition` to change it.
    async fn update(&self, doc: StoredDoc, mode: WriteMode) -> Result<(), StoreError>;

    /// Atomic update of a single field.
    async fn set_value(
        &self,
        doctype: &str,
        name: &str,
        field: &str,
        value: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Saves `doc` and moves it to `target` (draft → submitted or
    /// submitted → cancelled).
    async fn transition(&self, doc: StoredDoc, target: DocStatus) -> Result<(), StoreError>;

    async fn delete(&self, doctype: &str, name: &str) -> Result<(), StoreError>;

    /// Documents of `doctype` matching every filter, ordered by name.
    async fn list(&self, doctype: &str, filters: &[Filter]) -> Result<Vec<StoredDoc>, StoreError>;
}

pub(crate) fn check_update(current: &StoredDoc, mode: WriteMode) -> Result<(), StoreError> {
    match (current.docstatus, mode) {
        (DocStatus::Cancelled, _) => Err(StoreError::CancelledImmutable {
            doctype: current.doctype.clone(),
            name: current.name.clone(),
        }),
        (DocStatus::Submitted, WriteMode::Normal) => Err(StoreError::SubmittedImmutable {
            doctype: current.doctype.clone(),
            name: current.name.clone(),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn check_transition(current: &StoredDoc, target: DocStatus) -> Result<(), StoreError> {
    match (current.docstatus, target) {
        (DocStatus::Draft, DocStatus::Submitted) | (DocStatus::Submitted, DocStatus::Cancelled) => Ok(()),
        (from, to) => Err(StoreError::InvalidTransition {
            doctype: current.doctype.clone(),
            name: current.name.clone(),
            from,
            to,
        }),
    }
}

pub(crate) fn check_delete(current: &StoredDoc) -> Result<(), StoreError> {
    if current.docstatus == DocStatus::Submitted {
        return Err(StoreError::NotDeletable {
            doctype: current.doctype.clone(),
            name: current.name.clone(),
        });
    }
    Ok(())
}

/// Series key for `prefix` in the month of `now`, e.g. `PI-2025-06`.
pub(crate) fn series_key(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}-{}", now.format("%Y-%m"))
}

pub(crate) fn series_name(key: &str, sequence: i32) -> String {
    format!("{key}-{sequence:04}")
}

/// Typed access to an [`EntityStore`].
#[derive(Clone)]
pub struct DocStore {
    backend: Arc<dyn EntityStore>,
}

impl DocStore {
    pub fn new(backend: Arc<dyn EntityStore>) -> Self {
        Self { backend }
    }

    pub async fn load<T: Document>(&self, name: &str) -> Result<T, StoreError> {
        self.backend.fetch(T::DOCTYPE, name).await?.decode()
    }

    /// Like `load`, but a missing document is `None`.
    pub async fn find<T: Document>(&self, name: &str) -> Result<Option<T>, StoreError> {
        match self.load(name).await {
            Ok(doc) => Ok(Some(doc)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn insert<T: Document>(&self, doc: &T) -> Result<T, StoreError> {
        let stored = StoredDoc::encode(doc)?;
        self.backend.insert(stored, doc.naming_prefix()).await?.decode()
    }

    pub async fn save<T: Document>(&self, doc: &T, mode: WriteMode) -> Result<(), StoreError> {
        self.backend.update(StoredDoc::encode(doc)?, mode).await
    }

    pub async fn set_value<T: Document>(
        &self,
        name: &str,
        field: &str,
        value: impl Serialize,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.backend.set_value(T::DOCTYPE, name, field, value, mode).await
    }

    pub async fn submit<T: Document>(&self, doc: &mut T) -> Result<(), StoreError> {
        self.backend
            .transition(StoredDoc::encode(doc)?, DocStatus::Submitted)
            .await?;
        doc.set_docstatus(DocStatus::Submitted);
        Ok(())
    }

    pub async fn cancel<T: Document>(&self, doc: &mut T) -> Result<(), StoreError> {
        self.backend
            .transition(StoredDoc::encode(doc)?, DocStatus::Cancelled)
            .await?;
        doc.set_docstatus(DocStatus::Cancelled);
        Ok(())
    }

    pub async fn delete<T: Document>(&self, name: &str) -> Result<(), StoreError> {
        self.backend.delete(T::DOCTYPE, name).await
    }

    pub async fn list<T: Document>(&self, filters: &[Filter]) -> Result<Vec<T>, StoreError> {
        self.backend
            .list(T::DOCTYPE, filters)
            .await?
            .into_iter()
            .map(StoredDoc::decode)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rental_shared::BookingStatus;
    use serde_json::json;

    fn doc(docstatus: DocStatus, data: Value) -> StoredDoc {
        StoredDoc {
            doctype: "Rental Booking".into(),
            name: "RB-2025-07-0001".into(),
            docstatus,
            data,
        }
    }

    #[test]
    fn filters_read_columns_and_body() {
        let stored = doc(DocStatus::Submitted, json!({"vehicle": "KA-01-1234", "status": "Out"}));
        assert!(Filter::eq("docstatus", DocStatus::Submitted).matches(&stored));
        assert!(Filter::eq("vehicle", "KA-01-1234").matches(&stored));
        assert!(Filter::ne("name", "RB-2025-07-0002").matches(&stored));
        assert!(Filter::not_in("status", &[BookingStatus::Cancelled, BookingStatus::Completed]).matches(&stored));
        assert!(!Filter::not_in("status", &[BookingStatus::Out]).matches(&stored));
    }

    #[test]
    fn missing_field_compares_as_null() {
        let stored = doc(DocStatus::Draft, json!({}));
        assert!(Filter::eq("sales_invoice", Option::<String>::None).matches(&stored));
    }

    #[test]
    fn submitted_documents_need_the_override() {
        let stored = doc(DocStatus::Submitted, json!({}));
        assert!(matches!(
            check_update(&stored, WriteMode::Normal),
            Err(StoreError::SubmittedImmutable { .. })
        ));
        assert!(check_update(&stored, WriteMode::AfterSubmit).is_ok());

        let cancelled = doc(DocStatus::Cancelled, json!({}));
        assert!(check_update(&cancelled, WriteMode::AfterSubmit).is_err());
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        assert!(check_transition(&doc(DocStatus::Draft, json!({})), DocStatus::Submitted).is_ok());
        assert!(check_transition(&doc(DocStatus::Submitted, json!({})), DocStatus::Cancelled).is_ok());
        assert!(check_transition(&doc(DocStatus::Draft, json!({})), DocStatus::Cancelled).is_err());
        assert!(check_transition(&doc(DocStatus::Cancelled, json!({})), DocStatus::Submitted).is_err());
    }

    #[test]
    fn series_names_are_zero_padded() {
        assert_eq!(series_name("PI-2025-06", 7), "PI-2025-06-0007");
    }
}
