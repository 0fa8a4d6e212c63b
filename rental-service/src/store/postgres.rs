use super::{check_delete, check_transition, check_update, series_key, series_name, EntityStore, Filter, StoredDoc, WriteMode};
use crate::error::StoreError;
use crate::models::DbDocument;
use crate::schema::{documents, naming_series};
use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::sql;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Jsonb, Text};
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rental_shared::DocStatus;
use serde_json::{Map, Value};
use tracing::info;

type DbPool = Pool<AsyncPgConnection>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies pending migrations. The harness is synchronous, so it runs on a
/// blocking thread over a wrapped async connection.
pub async fn run_migrations(database_url: &str) -> Result<(), StoreError> {
    let conn = AsyncPgConnection::establish(database_url)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;
    let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> = AsyncConnectionWrapper::from(conn);

    let applied = tokio::task::spawn_blocking(move || {
        wrapper
            .run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.iter().map(ToString::to_string).collect::<Vec<_>>())
            .map_err(|e| StoreError::Migration(e.to_string()))
    })
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))??;

    for version in applied {
        info!(%version, "Migration applied");
    }
    Ok(())
}

/// Documents in one JSONB table keyed by (doctype, name). Every write locks
/// its row for the duration of the transaction.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder()
            .build(config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

type DocumentQuery<'a> = documents::BoxedQuery<'a, Pg>;

/// Pushes `filter` down as a SQL predicate. `name` and `docstatus` are
/// columns; every other field is read from the JSONB body, a missing key
/// comparing as JSON null.
fn apply_filter<'a>(query: DocumentQuery<'a>, filter: &Filter) -> DocumentQuery<'a> {
    match filter {
        Filter::Eq(field, value) => match field.as_str() {
            "name" => match value.as_str() {
                Some(name) => query.filter(documents::name.eq(name.to_string())),
                None => query.filter(sql::<Bool>("FALSE")),
            },
            "docstatus" => match docstatus_code(value) {
                Some(code) => query.filter(documents::docstatus.eq(code)),
                None => query.filter(sql::<Bool>("FALSE")),
            },
            _ if is_scalar(value) => {
                let mut containment = Map::new();
                containment.insert(field.clone(), value.clone());
                query.filter(sql::<Bool>("data @> ").bind::<Jsonb, _>(Value::Object(containment)))
            }
            _ => query.filter(
                sql::<Bool>("COALESCE(data -> ")
                    .bind::<Text, _>(field.clone())
                    .sql(", 'null'::jsonb) = ")
                    .bind::<Jsonb, _>(value.clone()),
            ),
        },
        Filter::Ne(field, value) => exclude(query, field, value),
        Filter::NotIn(field, values) => values.iter().fold(query, |query, value| exclude(query, field, value)),
    }
}

fn exclude<'a>(query: DocumentQuery<'a>, field: &str, value: &Value) -> DocumentQuery<'a> {
    match field {
        "name" => match value.as_str() {
            Some(name) => query.filter(documents::name.ne(name.to_string())),
            None => query,
        },
        "docstatus" => match docstatus_code(value) {
            Some(code) => query.filter(documents::docstatus.ne(code)),
            None => query,
        },
        _ => query.filter(
            sql::<Bool>("COALESCE(data -> ")
                .bind::<Text, _>(field.to_string())
                .sql(", 'null'::jsonb) <> ")
                .bind::<Jsonb, _>(value.clone()),
        ),
    }
}

fn docstatus_code(value: &Value) -> Option<i16> {
    serde_json::from_value::<DocStatus>(value.clone()).ok().map(DocStatus::as_i16)
}

// containment is exact only for scalars; arrays and objects match subsets
fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

async fn lock_row(conn: &mut AsyncPgConnection, doctype: &str, name: &str) -> Result<StoredDoc, StoreError> {
    let row = documents::table
        .filter(documents::doctype.eq(doctype))
        .filter(documents::name.eq(name))
        .for_update()
        .get_result::<DbDocument>(conn)
        .await
        .optional()?;

    match row {
        Some(row) => row.try_into(),
        None => Err(StoreError::NotFound {
            doctype: doctype.to_string(),
            name: name.to_string(),
        }),
    }
}

async fn write_row(conn: &mut AsyncPgConnection, doc: &StoredDoc) -> Result<(), StoreError> {
    diesel::update(
        documents::table
            .filter(documents::doctype.eq(&doc.doctype))
            .filter(documents::name.eq(&doc.name)),
    )
    .set((
        documents::docstatus.eq(doc.docstatus.as_i16()),
        documents::data.eq(&doc.data),
        documents::modified_at.eq(Some(Utc::now())),
    ))
    .execute(conn)
    .await?;
    Ok(())
}

async fn next_in_series(conn: &mut AsyncPgConnection, key: &str) -> Result<i32, StoreError> {
    let current = diesel::insert_into(naming_series::table)
        .values((naming_series::prefix.eq(key), naming_series::current.eq(1)))
        .on_conflict(naming_series::prefix)
        .do_update()
        .set(naming_series::current.eq(naming_series::current + 1))
        .returning(naming_series::current)
        .get_result::<i32>(conn)
        .await?;
    Ok(current)
}

#[async_trait]
impl EntityStore for PgStore {
    async fn fetch(&self, doctype: &str, name: &str) -> Result<StoredDoc, StoreError> {
        let mut conn = self.pool.get().await?;
        let row = documents::table
            .filter(documents::doctype.eq(doctype))
            .filter(documents::name.eq(name))
            .get_result::<DbDocument>(&mut *conn)
            .await
            .optional()?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::NotFound {
                doctype: doctype.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn insert(&self, doc: StoredDoc, prefix: &str) -> Result<StoredDoc, StoreError> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        let prefix = prefix.to_string();

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let mut doc = doc;
                if doc.name.is_empty() {
                    let key = series_key(&prefix, Utc::now());
                    let sequence = next_in_series(conn, &key).await?;
                    doc.name = series_name(&key, sequence);
                }
                doc.docstatus = DocStatus::Draft;

                let inserted = diesel::insert_into(documents::table)
                    .values(DbDocument::new(doc.clone(), Utc::now()))
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;
                if inserted == 0 {
                    return Err(StoreError::Duplicate {
                        doctype: doc.doctype,
                        name: doc.name,
                    });
                }
                Ok(doc)
            }
            .scope_boxed()
        })
        .await
    }

    async fn update(&self, doc: StoredDoc, mode: WriteMode) -> Result<(), StoreError> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let mut doc = doc;
                let current = lock_row(conn, &doc.doctype, &doc.name).await?;
                check_update(&current, mode)?;
                doc.docstatus = current.docstatus;
                write_row(conn, &doc).await
            }
            .scope_boxed()
        })
        .await
    }

    async fn set_value(
        &self,
        doctype: &str,
        name: &str,
        field: &str,
        value: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        let (doctype, name, field) = (doctype.to_string(), name.to_string(), field.to_string());

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let mut current = lock_row(conn, &doctype, &name).await?;
                check_update(&current, mode)?;
                if let Value::Object(fields) = &mut current.data {
                    fields.insert(field, value);
                }
                write_row(conn, &current).await
            }
            .scope_boxed()
        })
        .await
    }

    async fn transition(&self, doc: StoredDoc, target: DocStatus) -> Result<(), StoreError> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let mut doc = doc;
                let current = lock_row(conn, &doc.doctype, &doc.name).await?;
                check_transition(&current, target)?;
                doc.docstatus = target;
                write_row(conn, &doc).await
            }
            .scope_boxed()
        })
        .await
    }

    async fn delete(&self, doctype: &str, name: &str) -> Result<(), StoreError> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        let (doctype, name) = (doctype.to_string(), name.to_string());

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let current = lock_row(conn, &doctype, &name).await?;
                check_delete(&current)?;
                diesel::delete(
                    documents::table
                        .filter(documents::doctype.eq(&doctype))
                        .filter(documents::name.eq(&name)),
                )
                .execute(conn)
                .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn list(&self, doctype: &str, filters: &[Filter]) -> Result<Vec<StoredDoc>, StoreError> {
        let mut conn = self.pool.get().await?;
        let query = filters.iter().fold(
            documents::table
                .filter(documents::doctype.eq(doctype.to_string()))
                .into_boxed(),
            apply_filter,
        );
        let rows = query
            .order(documents::name.asc())
            .load::<DbDocument>(&mut *conn)
            .await?;

        rows.into_iter().map(StoredDoc::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rental_shared::BookingStatus;

    fn rendered(filters: &[Filter]) -> String {
        let query = filters.iter().fold(
            documents::table
                .filter(documents::doctype.eq("Rental Booking".to_string()))
                .into_boxed(),
            apply_filter,
        );
        diesel::debug_query::<Pg, _>(&query).to_string()
    }

    #[test]
    fn filters_become_sql_predicates() {
        let sql = rendered(&[
            Filter::eq("vehicle", "KA-01-1234"),
            Filter::eq("docstatus", DocStatus::Submitted),
            Filter::not_in("status", &[BookingStatus::Cancelled, BookingStatus::Completed]),
            Filter::ne("name", "RB-2025-06-0001"),
        ]);
        assert!(sql.contains("data @> $2"), "{sql}");
        assert!(sql.contains(r#""documents"."docstatus" = $3"#), "{sql}");
        assert_eq!(sql.matches("'null'::jsonb) <> ").count(), 2, "{sql}");
        assert!(sql.contains(r#""documents"."name" != $8"#), "{sql}");
    }

    #[test]
    fn null_and_unknown_values_keep_memory_semantics() {
        let sql = rendered(&[Filter::eq("sales_invoice", Option::<String>::None)]);
        assert!(sql.contains("COALESCE(data -> $2, 'null'::jsonb) = $3"), "{sql}");

        let sql = rendered(&[Filter::eq("docstatus", "Archived")]);
        assert!(sql.contains("FALSE"), "{sql}");
    }
}
