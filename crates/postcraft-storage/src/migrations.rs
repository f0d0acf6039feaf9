//! Document schema and migrations
//!
//! Collections per schema version:
//! - v1: images, layouts
//! - v2: projects
//!
//! Upgrades only ever create what is missing. Existing tables, indexes and
//! rows are never dropped or rewritten.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::Result;

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub key_path: &'static str,
}

const fn index(name: &'static str) -> IndexSpec {
    IndexSpec {
        name,
        key_path: name,
    }
}

const IMAGE_INDEXES: &[IndexSpec] = &[index("createdAt"), index("prompt"), index("platform")];
const LAYOUT_INDEXES: &[IndexSpec] = &[index("imageId"), index("platform")];
const PROJECT_INDEXES: &[IndexSpec] = &[index("name"), index("createdAt"), index("updatedAt")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Images,
    Layouts,
    Projects,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Images, Collection::Layouts, Collection::Projects];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Images => "images",
            Collection::Layouts => "layouts",
            Collection::Projects => "projects",
        }
    }

    pub fn indexes(&self) -> &'static [IndexSpec] {
        match self {
            Collection::Images => IMAGE_INDEXES,
            Collection::Layouts => LAYOUT_INDEXES,
            Collection::Projects => PROJECT_INDEXES,
        }
    }

    /// Schema version that introduced this collection.
    pub fn since_version(&self) -> u32 {
        match self {
            Collection::Images | Collection::Layouts => 1,
            Collection::Projects => 2,
        }
    }

    pub fn index(&self, name: &str) -> Option<&'static IndexSpec> {
        self.indexes().iter().find(|spec| spec.name == name)
    }

    pub(crate) fn table(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    upgrade_to(conn, SCHEMA_VERSION)
}

/// Bring the store up to `target`, creating any collection or index declared
/// at or below that version which does not exist yet.
pub(crate) fn upgrade_to(conn: &mut Connection, target: u32) -> Result<()> {
    let current = get_schema_version(conn).map_err(upgrade_failed)?;

    if current > target {
        return Err(StorageError::SchemaUpgradeFailed(format!(
            "store is at version {current}, newer than supported version {target}"
        )));
    }

    let tx = conn.transaction().map_err(upgrade_failed)?;
    for collection in Collection::ALL {
        if collection.since_version() <= target {
            create_collection(&tx, collection).map_err(upgrade_failed)?;
        }
    }
    set_schema_version(&tx, target).map_err(upgrade_failed)?;
    tx.commit().map_err(upgrade_failed)?;

    if current < target {
        tracing::info!(from = current, to = target, "Upgraded document schema");
    }

    Ok(())
}

pub(crate) fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn create_collection(conn: &Connection, collection: Collection) -> rusqlite::Result<()> {
    let table = collection.table();
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL
        );"
    ))?;

    for spec in collection.indexes() {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{name} ON {table} (json_extract(data, '$.{path}'));",
            name = spec.name,
            path = spec.key_path,
        ))?;
    }

    Ok(())
}

pub(crate) fn collection_exists(conn: &Connection, collection: Collection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [collection.table()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn upgrade_failed(err: rusqlite::Error) -> StorageError {
    StorageError::SchemaUpgradeFailed(err.to_string())
}
