//! SQLite-backed document store.
//!
//! Each document is one row of `documents`, keyed by `(collection, id)`, with its fields
//! serialized as a JSON object. Ordering and equality filters use `json_extract`.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::store::{
    apply_write, Direction, Document, DocumentStore, Fields, Query, StoreError, WriteFields,
};

/// Document store persisting to SQLite.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current time as stored for server timestamps.
    ///
    /// Fixed-width RFC 3339 so that lexicographic order matches chronological order.
    fn now() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Open a transaction holding the write lock from its first statement.
    ///
    /// A deferred transaction that reads before writing cannot upgrade once another
    /// writer has committed, and SQLite fails it with `SQLITE_BUSY` instead of waiting.
    async fn begin_write(&self) -> Result<sqlx::Transaction<'static, sqlx::Sqlite>, StoreError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn read_fields(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }
}

/// SQL argument of a dynamically built query.
enum Arg {
    Text(String),
    Int(i64),
    Real(f64),
}

impl Arg {
    fn from_json(field: &str, value: &Value) -> Result<Self, StoreError> {
        match value {
            Value::String(s) => Ok(Arg::Text(s.clone())),
            Value::Bool(b) => Ok(Arg::Int(*b as i64)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Arg::Int(i)),
                None => n
                    .as_f64()
                    .map(Arg::Real)
                    .ok_or_else(|| StoreError::UnsupportedValue(field.to_string())),
            },
            _ => Err(StoreError::UnsupportedValue(field.to_string())),
        }
    }
}

/// Build the `json_extract` expression for a field.
///
/// Field names are restricted to identifier characters so they can be inlined as a literal.
fn field_expr(field: &str) -> Result<String, StoreError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::InvalidField(field.to_string()));
    }
    Ok(format!("json_extract(data, '$.{}')", field))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut args = vec![Arg::Text(collection.to_string())];

        if let Some((field, value)) = &query.where_eq {
            sql.push_str(&format!(" AND {} = ?", field_expr(field)?));
            args.push(Arg::from_json(field, value)?);
        }

        match &query.order_by {
            Some(order) => {
                let expr = field_expr(&order.field)?;
                // Documents without the ordering field are not part of an ordered result
                sql.push_str(&format!(" AND {} IS NOT NULL", expr));

                let cmp = match order.direction {
                    Direction::Asc => ">",
                    Direction::Desc => "<",
                };

                if let Some(position) = &query.start_after {
                    sql.push_str(&format!(
                        " AND ({expr} {cmp} ? OR ({expr} = ? AND id {cmp} ?))"
                    ));
                    args.push(Arg::from_json(&order.field, &position.value)?);
                    args.push(Arg::from_json(&order.field, &position.value)?);
                    args.push(Arg::Text(position.id.clone()));
                }

                let dir = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                sql.push_str(&format!(" ORDER BY {expr} {dir}, id {dir}"));
            }
            None => {
                if let Some(position) = &query.start_after {
                    sql.push_str(" AND id > ?");
                    args.push(Arg::Text(position.id.clone()));
                }
                sql.push_str(" ORDER BY id ASC");
            }
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            args.push(Arg::Int(limit as i64));
        }

        let mut q = sqlx::query(&sql);
        for arg in args {
            q = match arg {
                Arg::Text(s) => q.bind(s),
                Arg::Int(i) => q.bind(i),
                Arg::Real(f) => q.bind(f),
            };
        }

        let rows = q.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<Document, StoreError> {
                let data: String = row.get("data");
                Ok(Document {
                    id: row.get("id"),
                    fields: serde_json::from_str(&data)?,
                })
            })
            .collect()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(Document {
                    id: row.get("id"),
                    fields: serde_json::from_str(&data)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn add(&self, collection: &str, fields: WriteFields) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut data = Fields::new();
        apply_write(&mut data, fields, &Self::now());

        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(serde_json::to_string(&data)?)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Created {}/{}", collection, id);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin_write().await?;

        let mut data = Self::read_fields(&mut tx, collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        apply_write(&mut data, fields, &Self::now());

        sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&data)?)
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin_write().await?;

        let mut data = Self::read_fields(&mut tx, collection, id)
            .await?
            .unwrap_or_default();
        apply_write(&mut data, fields, &Self::now());

        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
        )
        .bind(collection)
        .bind(id)
        .bind(serde_json::to_string(&data)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }
}
