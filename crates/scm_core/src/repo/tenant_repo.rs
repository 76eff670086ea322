//! Tenant tag/label registry contract and SQLite implementation.
//!
//! # Responsibility
//! - Track which tags and property labels a tenant currently uses.
//!
//! # Invariants
//! - Tags are reference-counted; a tag stays listed while any add is not
//!   matched by a remove.
//! - Labels are additive only.

use crate::repo::contact_repo::RepoResult;
use rusqlite::{params, Connection};

/// Registry hooks invoked by the lifecycle manager.
pub trait TenantRegistry {
    fn add_tags(&self, tenant: &str, tags: &[String]) -> RepoResult<()>;
    fn remove_tags(&self, tenant: &str, tags: &[String]) -> RepoResult<()>;
    fn add_labels(&self, tenant: &str, labels: &[String]) -> RepoResult<()>;
    /// Registered tags sorted by name.
    fn list_tags(&self, tenant: &str) -> RepoResult<Vec<String>>;
    /// Registered labels sorted by name.
    fn list_labels(&self, tenant: &str) -> RepoResult<Vec<String>>;
}

/// SQLite-backed tenant registry.
#[derive(Clone, Copy)]
pub struct SqliteTenantRegistry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTenantRegistry<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_tables(conn, &["tenant_tags", "tenant_labels"])?;
        Ok(Self { conn })
    }

    fn list_names(&self, sql: &str, tenant: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([tenant])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }
}

impl TenantRegistry for SqliteTenantRegistry<'_> {
    fn add_tags(&self, tenant: &str, tags: &[String]) -> RepoResult<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        for tag in tags {
            tx.execute(
                "INSERT INTO tenant_tags (tenant, name, usage_count) VALUES (?1, ?2, 1)
                 ON CONFLICT (tenant, name) DO UPDATE SET usage_count = usage_count + 1;",
                params![tenant, tag.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove_tags(&self, tenant: &str, tags: &[String]) -> RepoResult<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        for tag in tags {
            tx.execute(
                "UPDATE tenant_tags
                 SET usage_count = MAX(usage_count - 1, 0)
                 WHERE tenant = ?1 AND name = ?2;",
                params![tenant, tag.as_str()],
            )?;
        }
        tx.execute(
            "DELETE FROM tenant_tags WHERE tenant = ?1 AND usage_count = 0;",
            [tenant],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn add_labels(&self, tenant: &str, labels: &[String]) -> RepoResult<()> {
        if labels.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        for label in labels {
            tx.execute(
                "INSERT OR IGNORE INTO tenant_labels (tenant, name) VALUES (?1, ?2);",
                params![tenant, label.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_tags(&self, tenant: &str) -> RepoResult<Vec<String>> {
        self.list_names(
            "SELECT name FROM tenant_tags WHERE tenant = ?1 ORDER BY name ASC;",
            tenant,
        )
    }

    fn list_labels(&self, tenant: &str) -> RepoResult<Vec<String>> {
        self.list_names(
            "SELECT name FROM tenant_labels WHERE tenant = ?1 ORDER BY name ASC;",
            tenant,
        )
    }
}
