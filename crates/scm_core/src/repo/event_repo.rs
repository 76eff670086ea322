//! Audit log contract and SQLite implementation.
//!
//! # Responsibility
//! - Append audit events and read them back in insertion order.
//!
//! # Invariants
//! - The contract exposes no update or delete; storage triggers reject both.
//! - `contact_id` is not a foreign key, so events survive purges and merges.

use crate::model::contact::ContactId;
use crate::model::event::{ContactChange, ContactEvent, EventState};
use crate::repo::contact_repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

/// Filter options for reading the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventListQuery {
    pub tenant: String,
    pub contact_id: Option<ContactId>,
    pub limit: Option<u32>,
}

impl EventListQuery {
    pub fn for_tenant(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            ..Self::default()
        }
    }

    pub fn for_contact(tenant: impl Into<String>, contact_id: impl Into<ContactId>) -> Self {
        Self {
            tenant: tenant.into(),
            contact_id: Some(contact_id.into()),
            limit: None,
        }
    }
}

/// Append-only audit event storage.
pub trait AuditLog {
    /// Appends one event and returns its sequence number.
    fn append_event(
        &self,
        tenant: &str,
        user: &str,
        contact_id: &str,
        change: &ContactChange,
    ) -> RepoResult<i64>;
    /// Lists events ordered by sequence number.
    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<ContactEvent>>;
}

impl<A: AuditLog + ?Sized> AuditLog for &A {
    fn append_event(
        &self,
        tenant: &str,
        user: &str,
        contact_id: &str,
        change: &ContactChange,
    ) -> RepoResult<i64> {
        (**self).append_event(tenant, user, contact_id, change)
    }

    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<ContactEvent>> {
        (**self).list_events(query)
    }
}

/// SQLite-backed audit log.
#[derive(Clone, Copy)]
pub struct SqliteAuditLog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditLog<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_tables(conn, &["contact_events"])?;
        Ok(Self { conn })
    }
}

impl AuditLog for SqliteAuditLog<'_> {
    fn append_event(
        &self,
        tenant: &str,
        user: &str,
        contact_id: &str,
        change: &ContactChange,
    ) -> RepoResult<i64> {
        let (prop_key, prev_state, current_state) = match change {
            ContactChange::Field {
                prop_key,
                prev_state,
                current_state,
                ..
            } => (
                Some(prop_key.as_str()),
                Some(prev_state.as_str()),
                Some(current_state.as_str()),
            ),
            ContactChange::Merged { into } => (None, None, Some(into.as_str())),
            _ => (None, None, None),
        };

        self.conn.execute(
            "INSERT INTO contact_events (
                tenant,
                user_name,
                contact_id,
                state,
                prop_key,
                prev_state,
                current_state
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                tenant,
                user,
                contact_id,
                change.state().as_str(),
                prop_key,
                prev_state,
                current_state,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<ContactEvent>> {
        let mut sql = String::from(
            "SELECT
                seq,
                tenant,
                user_name,
                contact_id,
                state,
                prop_key,
                prev_state,
                current_state,
                recorded_at
             FROM contact_events
             WHERE tenant = ?",
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(query.tenant.clone())];

        if let Some(contact_id) = query.contact_id.as_ref() {
            sql.push_str(" AND contact_id = ?");
            bind_values.push(Value::Text(contact_id.clone()));
        }

        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }

        Ok(events)
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<ContactEvent> {
    let seq: i64 = row.get("seq")?;
    let state_text: String = row.get("state")?;
    let state = EventState::parse(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid event state `{state_text}` at seq {seq}"))
    })?;

    let change = ContactChange::from_columns(
        state,
        row.get("prop_key")?,
        row.get("prev_state")?,
        row.get("current_state")?,
    )
    .ok_or_else(|| {
        RepoError::InvalidData(format!("incomplete `{state}` event payload at seq {seq}"))
    })?;

    Ok(ContactEvent {
        seq,
        tenant: row.get("tenant")?,
        user: row.get("user_name")?,
        contact_id: row.get("contact_id")?,
        change,
        recorded_at: row.get("recorded_at")?,
    })
}
