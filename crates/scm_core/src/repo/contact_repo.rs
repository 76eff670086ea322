//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist contacts in per-tenant `active` / `deleted` collections.
//! - Report which collections a tenant has provisioned.
//! - Move records between collections in one step.
//!
//! # Invariants
//! - A contact id lives in at most one collection of its tenant; the
//!   `(tenant, id)` key enforces this in storage.
//! - Read paths reject malformed persisted rows instead of masking them.

use crate::db::DbError;
use crate::model::contact::{Contact, ContactId};
use log::debug;
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CONTACT_SELECT_SQL: &str = "SELECT
    tenant,
    id,
    title,
    user_name,
    comments,
    created_at,
    tags_json,
    props_json,
    attributes
FROM contacts";

pub type RepoResult<T> = Result<T, RepoError>;

/// One of the two record partitions every tenant owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Active,
    Deleted,
}

impl CollectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository error shared by store, audit log and registry.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    NotFound {
        tenant: String,
        kind: CollectionKind,
        id: ContactId,
    },
    /// The id already lives in the other collection of this tenant.
    CollectionConflict {
        tenant: String,
        id: ContactId,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted contact data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::NotFound { tenant, kind, id } => {
                write!(f, "contact `{id}` not found in {tenant}/{kind}")
            }
            Self::CollectionConflict { tenant, id } => write!(
                f,
                "contact `{id}` already stored in another collection of {tenant}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract for tenant record collections.
pub trait RecordStore {
    fn collection_exists(&self, tenant: &str, kind: CollectionKind) -> RepoResult<bool>;
    fn get_contact(
        &self,
        tenant: &str,
        kind: CollectionKind,
        id: &str,
    ) -> RepoResult<Option<Contact>>;
    fn list_contacts(&self, tenant: &str, kind: CollectionKind) -> RepoResult<Vec<Contact>>;
    /// Inserts or replaces `contact` in the given collection.
    fn save_contact(&self, tenant: &str, kind: CollectionKind, contact: &Contact)
        -> RepoResult<()>;
    fn remove_contact(&self, tenant: &str, kind: CollectionKind, id: &str) -> RepoResult<()>;
    /// Moves one record between collections; the record is never absent
    /// from both.
    fn move_contact(
        &self,
        tenant: &str,
        from: CollectionKind,
        to: CollectionKind,
        id: &str,
    ) -> RepoResult<()>;

    /// Runs `work` so that every write it makes through this store's
    /// backend lands together or not at all. `work` must not open its own
    /// transaction on the same backend.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        work()
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn collection_exists(&self, tenant: &str, kind: CollectionKind) -> RepoResult<bool> {
        (**self).collection_exists(tenant, kind)
    }

    fn get_contact(
        &self,
        tenant: &str,
        kind: CollectionKind,
        id: &str,
    ) -> RepoResult<Option<Contact>> {
        (**self).get_contact(tenant, kind, id)
    }

    fn list_contacts(&self, tenant: &str, kind: CollectionKind) -> RepoResult<Vec<Contact>> {
        (**self).list_contacts(tenant, kind)
    }

    fn save_contact(
        &self,
        tenant: &str,
        kind: CollectionKind,
        contact: &Contact,
    ) -> RepoResult<()> {
        (**self).save_contact(tenant, kind, contact)
    }

    fn remove_contact(&self, tenant: &str, kind: CollectionKind, id: &str) -> RepoResult<()> {
        (**self).remove_contact(tenant, kind, id)
    }

    fn move_contact(
        &self,
        tenant: &str,
        from: CollectionKind,
        to: CollectionKind,
        id: &str,
    ) -> RepoResult<()> {
        (**self).move_contact(tenant, from, to, id)
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        (**self).atomically(work)
    }
}

/// SQLite-backed record store.
#[derive(Clone, Copy)]
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_tables(conn, &["tenant_collections", "contacts"])?;
        Ok(Self { conn })
    }

    /// Provisions one collection for `tenant`. Idempotent.
    pub fn create_collection(&self, tenant: &str, kind: CollectionKind) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tenant_collections (tenant, kind) VALUES (?1, ?2);",
            params![tenant, kind.as_str()],
        )?;
        Ok(())
    }

    /// Provisions both collections for `tenant`.
    pub fn provision_tenant(&self, tenant: &str) -> RepoResult<()> {
        self.create_collection(tenant, CollectionKind::Active)?;
        self.create_collection(tenant, CollectionKind::Deleted)
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn collection_exists(&self, tenant: &str, kind: CollectionKind) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM tenant_collections
                WHERE tenant = ?1 AND kind = ?2
            );",
            params![tenant, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_contact(
        &self,
        tenant: &str,
        kind: CollectionKind,
        id: &str,
    ) -> RepoResult<Option<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTACT_SELECT_SQL}
             WHERE tenant = ?1
               AND collection = ?2
               AND id = ?3;"
        ))?;

        let mut rows = stmt.query(params![tenant, kind.as_str(), id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_contact_row(row)?));
        }

        Ok(None)
    }

    fn list_contacts(&self, tenant: &str, kind: CollectionKind) -> RepoResult<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTACT_SELECT_SQL}
             WHERE tenant = ?1
               AND collection = ?2
             ORDER BY created_at ASC, id ASC;"
        ))?;

        let mut rows = stmt.query(params![tenant, kind.as_str()])?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            contacts.push(parse_contact_row(row)?);
        }

        Ok(contacts)
    }

    fn save_contact(
        &self,
        tenant: &str,
        kind: CollectionKind,
        contact: &Contact,
    ) -> RepoResult<()> {
        let tags_json = serde_json::to_string(&contact.tags)
            .map_err(|err| RepoError::InvalidData(format!("tags not serializable: {err}")))?;
        let props_json = serde_json::to_string(&contact.props)
            .map_err(|err| RepoError::InvalidData(format!("props not serializable: {err}")))?;

        // The conditional DO UPDATE turns a cross-collection save into a no-op,
        // reported below as a conflict.
        let changed = self.conn.execute(
            "INSERT INTO contacts (
                tenant,
                id,
                collection,
                title,
                user_name,
                comments,
                created_at,
                tags_json,
                props_json,
                attributes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (tenant, id) DO UPDATE SET
                title = excluded.title,
                user_name = excluded.user_name,
                comments = excluded.comments,
                created_at = excluded.created_at,
                tags_json = excluded.tags_json,
                props_json = excluded.props_json,
                attributes = excluded.attributes,
                updated_at = (strftime('%s', 'now') * 1000)
            WHERE contacts.collection = excluded.collection;",
            params![
                tenant,
                contact.id.as_str(),
                kind.as_str(),
                contact.title.as_str(),
                contact.user.as_str(),
                contact.comments.as_str(),
                contact.created_at,
                tags_json,
                props_json,
                contact.attributes.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::CollectionConflict {
                tenant: tenant.to_string(),
                id: contact.id.clone(),
            });
        }

        debug!("event=contact_save module=repo status=ok tenant={tenant} collection={kind}");
        Ok(())
    }

    fn remove_contact(&self, tenant: &str, kind: CollectionKind, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM contacts
             WHERE tenant = ?1
               AND collection = ?2
               AND id = ?3;",
            params![tenant, kind.as_str(), id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                tenant: tenant.to_string(),
                kind,
                id: id.to_string(),
            });
        }

        Ok(())
    }

    fn move_contact(
        &self,
        tenant: &str,
        from: CollectionKind,
        to: CollectionKind,
        id: &str,
    ) -> RepoResult<()> {
        // A single UPDATE: the row never leaves the table, so a failure
        // leaves it in `from`.
        let changed = self.conn.execute(
            "UPDATE contacts
             SET
                collection = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE tenant = ?1
               AND id = ?4
               AND collection = ?2;",
            params![tenant, from.as_str(), to.as_str(), id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                tenant: tenant.to_string(),
                kind: from,
                id: id.to_string(),
            });
        }

        debug!("event=contact_move module=repo status=ok tenant={tenant} from={from} to={to}");
        Ok(())
    }

    /// Wraps `work` in one transaction on the shared connection. An error
    /// from `work` drops the transaction, which rolls it back.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(RepoError::from)?;
        let out = work()?;
        tx.commit().map_err(RepoError::from)?;
        Ok(out)
    }
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<Contact> {
    let id: String = row.get("id")?;

    let tags_json: String = row.get("tags_json")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|err| {
        RepoError::InvalidData(format!("invalid tags_json for contact `{id}`: {err}"))
    })?;

    let props_json: String = row.get("props_json")?;
    let props: BTreeMap<String, String> = serde_json::from_str(&props_json).map_err(|err| {
        RepoError::InvalidData(format!("invalid props_json for contact `{id}`: {err}"))
    })?;

    Ok(Contact {
        id,
        title: row.get("title")?,
        user: row.get("user_name")?,
        tenant: row.get("tenant")?,
        comments: row.get("comments")?,
        created_at: row.get("created_at")?,
        tags,
        props,
        attributes: row.get("attributes")?,
    })
}
