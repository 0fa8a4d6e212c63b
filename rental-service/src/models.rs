use crate::error::StoreError;
use crate::store::StoredDoc;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rental_shared::DocStatus;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::documents)]
pub struct DbDocument {
    pub doctype: String,
    pub name: String,
    pub docstatus: i16,
    pub data: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl DbDocument {
    pub fn new(doc: StoredDoc, now: DateTime<Utc>) -> Self {
        Self {
            doctype: doc.doctype,
            name: doc.name,
            docstatus: doc.docstatus.as_i16(),
            data: doc.data,
            created_at: Some(now),
            modified_at: Some(now),
        }
    }
}

impl TryFrom<DbDocument> for StoredDoc {
    type Error = StoreError;

    fn try_from(row: DbDocument) -> Result<Self, Self::Error> {
        let docstatus = DocStatus::from_i16(row.docstatus).ok_or_else(|| StoreError::CorruptDocStatus {
            doctype: row.doctype.clone(),
            name: row.name.clone(),
            value: row.docstatus,
        })?;

        Ok(Self {
            doctype: row.doctype,
            name: row.name,
            docstatus,
            data: row.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_docstatus_is_reported() {
        let row = DbDocument {
            doctype: "Rental Booking".into(),
            name: "RB-2025-06-0001".into(),
            docstatus: 9,
            data: json!({}),
            created_at: None,
            modified_at: None,
        };
        let err = StoredDoc::try_from(row).unwrap_err();
        assert!(matches!(err, StoreError::CorruptDocStatus { value: 9, .. }));
    }

    #[test]
    fn row_keeps_lifecycle_column() {
        let doc = StoredDoc {
            doctype: "Rental Contract".into(),
            name: "RC-2025-06-0001".into(),
            docstatus: DocStatus::Submitted,
            data: json!({"contract_status": "Active"}),
        };
        let row = DbDocument::new(doc.clone(), Utc::now());
        assert_eq!(row.docstatus, 1);
        assert_eq!(StoredDoc::try_from(row).unwrap(), doc);
    }
}
