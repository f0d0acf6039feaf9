//! Document store
//!
//! Versioned storage of JSON records partitioned into collections. Every
//! record carries `id`, `createdAt` and `updatedAt`; writes replace the whole
//! record.
//!
//! Known scalability ceiling: `filter` in [`GetAllOptions`] is evaluated in
//! memory over the scanned rows, and is not index-accelerated.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::{Database, DocumentLocation};
use crate::error::StorageError;
use crate::migrations::{collection_exists, get_schema_version, Collection};
use crate::Result;

pub const DOCUMENT_STORE_NAME: &str = "postcraft-documents";

pub type Record = serde_json::Map<String, Value>;

/// Timestamp followed by a random suffix. Unique enough for a single user's
/// library; not a cryptographic identifier.
pub fn generate_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// RFC 3339 with fixed microsecond precision, so string order is time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn record_timestamp(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    record.get(field).and_then(Value::as_str).and_then(parse_timestamp)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub index: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default)]
pub struct GetAllOptions {
    pub order_by: Option<OrderBy>,
    /// Field equality conditions, all of which must hold.
    pub filter: Vec<(String, Value)>,
    pub limit: Option<usize>,
}

impl GetAllOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, index: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            index: index.to_string(),
            direction,
        });
        self
    }

    pub fn filter(mut self, field: &str, value: Value) -> Self {
        self.filter.push((field.to_string(), value));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStoreInfo {
    pub name: String,
    pub version: u32,
    pub collections: Vec<CollectionInfo>,
    pub total_items: usize,
}

pub struct DocumentStore {
    db: Database,
}

impl DocumentStore {
    pub fn new(location: DocumentLocation) -> Self {
        Self {
            db: Database::new(location),
        }
    }

    pub fn is_open(&self) -> bool {
        self.db.is_open()
    }

    pub async fn open(&self) -> Result<()> {
        self.db.open().await
    }

    pub fn close(&self) {
        self.db.close();
    }

    pub fn fatal_error(&self) -> Option<String> {
        self.db.fatal_error()
    }

    /// Write `record` in full. Assigns an id when absent, keeps the first
    /// `createdAt`, and moves `updatedAt` strictly forward.
    ///
    /// A caller-supplied `createdAt` is honoured only on the first write of
    /// an id. Parseable timestamps are rewritten in the fixed format.
    pub async fn put(&self, collection: Collection, record: Record) -> Result<String> {
        self.db
            .call(move |conn| put_record(conn, collection, record))
            .await
    }

    pub async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let raw = load_raw(conn, collection, &id)?;
                raw.map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
                    .transpose()
            })
            .await
    }

    pub async fn get_all(&self, collection: Collection, options: GetAllOptions) -> Result<Vec<Record>> {
        self.db
            .call(move |conn| {
                let table = collection.table();
                let sql = match options
                    .order_by
                    .as_ref()
                    .and_then(|order| collection.index(&order.index).map(|spec| (spec, order)))
                {
                    Some((spec, order)) => {
                        let dir = match order.direction {
                            Direction::Asc => "ASC",
                            Direction::Desc => "DESC",
                        };
                        format!(
                            "SELECT data FROM {table} ORDER BY json_extract(data, '$.{}') {dir}, id {dir}",
                            spec.key_path
                        )
                    }
                    None => {
                        if let Some(order) = &options.order_by {
                            tracing::debug!(
                                collection = %collection,
                                index = %order.index,
                                "No such index, scanning unordered"
                            );
                        }
                        format!("SELECT data FROM {table}")
                    }
                };

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

                let mut records = Vec::new();
                for raw in rows {
                    if options.limit.is_some_and(|limit| records.len() >= limit) {
                        break;
                    }
                    let raw = raw?;
                    let record: Record = match serde_json::from_str(&raw) {
                        Ok(record) => record,
                        Err(e) => {
                            tracing::warn!(collection = %collection, "Skipping unreadable record: {}", e);
                            continue;
                        }
                    };

                    if options
                        .filter
                        .iter()
                        .all(|(field, value)| record.get(field) == Some(value))
                    {
                        records.push(record);
                    }
                }

                Ok(records)
            })
            .await
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());
                let removed = conn.execute(&sql, [&id])?;
                Ok(removed > 0)
            })
            .await
    }

    pub async fn clear(&self, collection: Collection) -> Result<bool> {
        self.db
            .call(move |conn| {
                conn.execute(&format!("DELETE FROM {}", collection.table()), [])?;
                tracing::info!(collection = %collection, "Cleared collection");
                Ok(true)
            })
            .await
    }

    pub async fn count(&self, collection: Collection) -> Result<usize> {
        self.db.call(move |conn| count_rows(conn, collection)).await
    }

    pub async fn info(&self) -> Result<DocumentStoreInfo> {
        self.db
            .call(|conn| {
                let version = get_schema_version(conn)?;
                let mut collections = Vec::new();
                for collection in Collection::ALL {
                    if collection_exists(conn, collection)? {
                        collections.push(CollectionInfo {
                            name: collection.as_str().to_string(),
                            count: count_rows(conn, collection)?,
                        });
                    }
                }

                let total_items = collections.iter().map(|c| c.count).sum();
                Ok(DocumentStoreInfo {
                    name: DOCUMENT_STORE_NAME.to_string(),
                    version,
                    collections,
                    total_items,
                })
            })
            .await
    }
}

impl Clone for DocumentStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

fn load_raw(conn: &Connection, collection: Collection, id: &str) -> Result<Option<String>> {
    let sql = format!("SELECT data FROM {} WHERE id = ?1", collection.table());
    Ok(conn.query_row(&sql, [id], |row| row.get(0)).optional()?)
}

fn count_rows(conn: &Connection, collection: Collection) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

fn present_field(record: &Record, field: &str) -> Option<Value> {
    record.get(field).filter(|v| !v.is_null()).cloned()
}

fn normalize_timestamp(value: Value) -> Value {
    match value.as_str().and_then(parse_timestamp) {
        Some(at) => Value::String(format_timestamp(at)),
        None => value,
    }
}

fn put_record(conn: &mut Connection, collection: Collection, mut record: Record) -> Result<String> {
    let id = match record.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        None | Some(Value::Null) => generate_id(),
        Some(Value::String(_)) => generate_id(),
        Some(other) => {
            return Err(StorageError::InvalidRecord(format!(
                "id must be a string, got {other}"
            )))
        }
    };

    let tx = conn.transaction()?;
    let existing: Option<Record> = load_raw(&tx, collection, &id)?
        .and_then(|raw| serde_json::from_str(&raw).ok());

    let created = existing
        .as_ref()
        .and_then(|prev| present_field(prev, "createdAt"))
        .or_else(|| present_field(&record, "createdAt"))
        .map(normalize_timestamp)
        .unwrap_or_else(|| Value::String(format_timestamp(Utc::now())));
    record.insert("createdAt".to_string(), created);

    let previous = [
        record_timestamp(&record, "updatedAt"),
        existing
            .as_ref()
            .and_then(|prev| record_timestamp(prev, "updatedAt")),
    ]
    .into_iter()
    .flatten()
    .max();

    let now = Utc::now();
    let updated = match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    };

    record.insert("id".to_string(), Value::String(id.clone()));
    record.insert(
        "updatedAt".to_string(),
        Value::String(format_timestamp(updated)),
    );

    let data = serde_json::to_string(&record)?;
    tx.execute(
        &format!(
            "INSERT OR REPLACE INTO {} (id, data) VALUES (?1, ?2)",
            collection.table()
        ),
        rusqlite::params![id, data],
    )?;
    tx.commit()?;

    tracing::debug!(collection = %collection, id = %id, "Stored record");
    Ok(id)
}
