//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the record store, audit log and tenant registry contracts.
//! - Keep SQL details away from lifecycle orchestration.
//!
//! # Invariants
//! - Repositories are constructed from migrated connections only.
//! - Repository APIs return semantic errors (`NotFound`,
//!   `CollectionConflict`) in addition to DB transport errors.

pub mod contact_repo;
pub mod event_repo;
pub mod tenant_repo;

use crate::repo::contact_repo::{RepoError, RepoResult};
use rusqlite::Connection;

pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
