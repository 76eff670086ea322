//! Contact lifecycle use-cases.
//!
//! # Responsibility
//! - Create, update, soft-delete, revert, purge and merge contacts.
//! - Keep the tenant tag/label registry and audit trail in step with every
//!   lifecycle transition.
//! - Expose the read surface used by search, export and duplicate review.
//!
//! # Invariants
//! - Tenant and collection checks run before id and content validation.
//! - Ids are assigned once, on create or bulk import, and never regenerated.
//! - Diff events are appended before the diffed field is overwritten.
//! - A merge source is removed from `active` without passing through
//!   `deleted`.

use crate::model::contact::{
    generate_contact_id, normalize_tags, now_epoch_ms, Contact, ContactId, ImportRecord,
};
use crate::model::event::{ContactChange, ContactEvent};
use crate::repo::contact_repo::{CollectionKind, RecordStore, SqliteRecordStore};
use crate::repo::event_repo::{AuditLog, EventListQuery, SqliteAuditLog};
use crate::repo::tenant_repo::{SqliteTenantRegistry, TenantRegistry};
use crate::search::query::{ContactSearch, PipeGuard, SearchRequest};
use crate::service::audit::AuditRecorder;
use crate::service::duplicates::{DuplicateClusters, DuplicateDetector};
use crate::service::error::{ContactServiceError, ServiceResult};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashSet};

/// Attempts at drawing a fresh id before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Lifecycle manager over one store, audit log and tag/label registry.
pub struct ContactService<S: RecordStore, A: AuditLog, T: TenantRegistry> {
    store: S,
    audit: AuditRecorder<A>,
    registry: T,
    pipe_guard: PipeGuard,
}

/// Lifecycle manager wired to one SQLite connection.
pub type SqliteContactService<'conn> =
    ContactService<SqliteRecordStore<'conn>, SqliteAuditLog<'conn>, SqliteTenantRegistry<'conn>>;

impl<'conn> SqliteContactService<'conn> {
    /// Builds a service whose collaborators all share `conn`.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Ok(Self::new(
            SqliteRecordStore::try_new(conn)?,
            SqliteAuditLog::try_new(conn)?,
            SqliteTenantRegistry::try_new(conn)?,
        ))
    }
}

impl<S: RecordStore, A: AuditLog, T: TenantRegistry> ContactService<S, A, T> {
    pub fn new(store: S, audit_log: A, registry: T) -> Self {
        Self {
            store,
            audit: AuditRecorder::new(audit_log),
            registry,
            pipe_guard: PipeGuard::default(),
        }
    }

    /// Selects the OR-branch strategy used by [`Self::search`].
    pub fn with_pipe_guard(mut self, guard: PipeGuard) -> Self {
        self.pipe_guard = guard;
        self
    }

    pub fn pipe_guard(&self) -> PipeGuard {
        self.pipe_guard
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &T {
        &self.registry
    }

    /// Creates one contact in the tenant's active collection.
    ///
    /// `duplicate` marks records created from a duplicate-review flow and
    /// switches the emitted event from `CREATED` to `DUPLICATED`.
    pub fn create_contact(
        &self,
        mut contact: Contact,
        user: &str,
        duplicate: bool,
    ) -> ServiceResult<Contact> {
        let tenant = contact.tenant.clone();
        self.require_tenant("contact_create", &tenant)?;
        self.require_collection("contact_create", &tenant, CollectionKind::Active)?;

        if !contact.id.trim().is_empty()
            && self
                .store
                .get_contact(&tenant, CollectionKind::Active, &contact.id)?
                .is_some()
        {
            warn!(
                "event=contact_create module=service status=error error_code=already_exists tenant={tenant}"
            );
            return Err(ContactServiceError::AlreadyExists(contact.id));
        }
        contact.validate()?;

        contact.id = self.fresh_id(&tenant, &contact.title)?;
        contact.created_at = now_epoch_ms();
        contact.tags = normalize_tags(&contact.tags);
        contact.refresh_attributes();

        self.store
            .save_contact(&tenant, CollectionKind::Active, &contact)?;
        self.register_content(&contact)?;

        let change = if duplicate {
            ContactChange::Duplicated
        } else {
            ContactChange::Created
        };
        self.audit.record(&contact, user, &change)?;

        info!(
            "event=contact_create module=service status=ok tenant={tenant} contact_id={} state={}",
            contact.id,
            change.state()
        );
        Ok(contact)
    }

    /// Overwrites title, comments, tags and props of an active contact.
    ///
    /// Id, owner and creation time are kept from the stored record.
    pub fn update_contact(&self, contact: &Contact, user: &str) -> ServiceResult<Contact> {
        let tenant = contact.tenant.as_str();
        self.require_tenant("contact_update", tenant)?;
        self.require_collection("contact_update", tenant, CollectionKind::Active)?;
        if contact.id.trim().is_empty() {
            return Err(ContactServiceError::validation("contact id is empty"));
        }
        contact.validate()?;

        let mut existing = self.load(tenant, CollectionKind::Active, &contact.id)?;
        let mut incoming = contact.clone();
        incoming.tags = normalize_tags(&incoming.tags);

        self.audit
            .record_title_change(&existing, &incoming.title, user)?;
        existing.title = incoming.title.clone();
        existing.comments = incoming.comments.clone();

        let tag_events = self.audit.diff_tags(&existing, &incoming, user)?;
        existing.tags = incoming.tags.clone();

        let prop_events = self.audit.diff_props(&existing, &incoming, user)?;
        existing.props = incoming.props;

        existing.refresh_attributes();
        self.registry
            .add_labels(tenant, &prop_keys(&existing.props))?;
        self.store
            .save_contact(tenant, CollectionKind::Active, &existing)?;

        info!(
            "event=contact_update module=service status=ok tenant={tenant} contact_id={} tag_events={tag_events} prop_events={prop_events}",
            existing.id
        );
        Ok(existing)
    }

    /// Reads one active contact.
    pub fn find_contact(&self, tenant: &str, id: &str) -> ServiceResult<Contact> {
        self.require_tenant("contact_find", tenant)?;
        self.require_collection("contact_find", tenant, CollectionKind::Active)?;
        if id.trim().is_empty() {
            return Err(ContactServiceError::validation("contact id is empty"));
        }
        self.load(tenant, CollectionKind::Active, id)
    }

    /// Lists every record of one collection in creation order.
    pub fn list_contacts(&self, tenant: &str, kind: CollectionKind) -> ServiceResult<Vec<Contact>> {
        self.require_tenant("contact_list", tenant)?;
        self.require_collection("contact_list", tenant, kind)?;
        Ok(self.store.list_contacts(tenant, kind)?)
    }

    /// Moves one contact from `active` to `deleted`.
    pub fn soft_delete_contact(&self, tenant: &str, id: &str, user: &str) -> ServiceResult<()> {
        self.require_move_target("contact_delete", tenant, id)?;
        let contact = self.load(tenant, CollectionKind::Active, id)?;
        self.soft_delete_loaded(&contact, user)?;
        info!("event=contact_delete module=service status=ok tenant={tenant} contact_id={id}");
        Ok(())
    }

    /// Soft-deletes every listed contact that is currently active.
    ///
    /// Unknown ids are skipped; fails only when none of the ids resolve.
    /// Returns the ids that were deleted, in request order.
    pub fn soft_delete_contacts(
        &self,
        tenant: &str,
        ids: &[String],
        user: &str,
    ) -> ServiceResult<Vec<ContactId>> {
        self.require_tenant("contact_delete_many", tenant)?;
        self.require_collection("contact_delete_many", tenant, CollectionKind::Active)?;
        self.require_collection("contact_delete_many", tenant, CollectionKind::Deleted)?;
        if ids.is_empty() {
            return Err(ContactServiceError::validation("contact id list is empty"));
        }

        let lookups = ids
            .iter()
            .map(|id| self.store.get_contact(tenant, CollectionKind::Active, id))
            .collect::<Result<Vec<Option<Contact>>, _>>()?;
        let skipped = lookups.iter().filter(|lookup| lookup.is_none()).count();

        let mut seen = HashSet::new();
        let found: Vec<Contact> = lookups
            .into_iter()
            .flatten()
            .filter(|contact| seen.insert(contact.id.clone()))
            .collect();
        if found.is_empty() {
            warn!(
                "event=contact_delete_many module=service status=error error_code=none_found tenant={tenant} requested={}",
                ids.len()
            );
            return Err(ContactServiceError::not_found(
                tenant,
                CollectionKind::Active,
                &ids.join(","),
            ));
        }

        for contact in &found {
            self.soft_delete_loaded(contact, user)?;
        }

        info!(
            "event=contact_delete_many module=service status=ok tenant={tenant} deleted={} skipped={skipped}",
            found.len()
        );
        Ok(found.into_iter().map(|contact| contact.id).collect())
    }

    /// Permanently removes a soft-deleted contact. Emits no event.
    pub fn purge_contact(&self, tenant: &str, id: &str, user: &str) -> ServiceResult<()> {
        self.require_move_target("contact_purge", tenant, id)?;
        self.load(tenant, CollectionKind::Deleted, id)?;
        self.store
            .remove_contact(tenant, CollectionKind::Deleted, id)?;
        info!(
            "event=contact_purge module=service status=ok tenant={tenant} contact_id={id} user={user}"
        );
        Ok(())
    }

    /// Moves a soft-deleted contact back to `active`.
    pub fn revert_contact(&self, tenant: &str, id: &str, user: &str) -> ServiceResult<Contact> {
        self.require_move_target("contact_revert", tenant, id)?;
        let contact = self.load(tenant, CollectionKind::Deleted, id)?;

        self.store.move_contact(
            tenant,
            CollectionKind::Deleted,
            CollectionKind::Active,
            &contact.id,
        )?;
        self.audit
            .record(&contact, user, &ContactChange::Reverted)?;
        self.registry.add_tags(tenant, &contact.tags)?;

        info!("event=contact_revert module=service status=ok tenant={tenant} contact_id={id}");
        Ok(contact)
    }

    /// Folds `source_id` into `target_id` and removes the source.
    ///
    /// Target tags and props win; source-only tags are appended and
    /// source-only props added. The registry is not updated.
    pub fn merge_contacts(
        &self,
        target_id: &str,
        source_id: &str,
        tenant: &str,
        user: &str,
    ) -> ServiceResult<Contact> {
        self.require_tenant("contact_merge", tenant)?;
        self.require_collection("contact_merge", tenant, CollectionKind::Active)?;
        if target_id.trim().is_empty() || source_id.trim().is_empty() {
            return Err(ContactServiceError::validation("contact id is empty"));
        }
        if target_id == source_id {
            return Err(ContactServiceError::validation(
                "cannot merge a contact into itself",
            ));
        }

        let mut target = self.load(tenant, CollectionKind::Active, target_id)?;
        let source = self.load(tenant, CollectionKind::Active, source_id)?;

        // Diff events, the target save, the source removal and the MERGED
        // event commit together.
        let (tag_events, prop_events) =
            self.store.atomically(|| -> ServiceResult<(usize, usize)> {
                let tag_events = self.audit.diff_tags_merging(&target, &source, user)?;
                target.tags = merged_tags(&target.tags, &source.tags);

                let prop_events = self.audit.diff_props_merging(&target, &source, user)?;
                target.props = merged_props(&target.props, &source.props);

                target.refresh_attributes();
                self.store
                    .save_contact(tenant, CollectionKind::Active, &target)?;
                self.store
                    .remove_contact(tenant, CollectionKind::Active, &source.id)?;
                self.audit.record(
                    &source,
                    user,
                    &ContactChange::Merged {
                        into: target.id.clone(),
                    },
                )?;
                Ok((tag_events, prop_events))
            })?;

        info!(
            "event=contact_merge module=service status=ok tenant={tenant} target_id={target_id} source_id={source_id} tag_events={tag_events} prop_events={prop_events}"
        );
        Ok(target)
    }

    /// Bulk import entry point.
    ///
    /// Every record is validated before any is written. Records get fresh
    /// ids and a `CREATED` event attributed to their own user; no
    /// existing-id checks are made.
    pub fn save_all_contacts(&self, records: Vec<ImportRecord>) -> ServiceResult<Vec<Contact>> {
        let contacts: Vec<Contact> = records
            .into_iter()
            .map(ImportRecord::into_contact)
            .collect();

        let mut provisioned = HashSet::new();
        for contact in &contacts {
            self.require_tenant("contact_import", &contact.tenant)?;
            if provisioned.insert(contact.tenant.clone()) {
                self.require_collection("contact_import", &contact.tenant, CollectionKind::Active)?;
            }
            contact.validate()?;
        }

        let mut saved = Vec::with_capacity(contacts.len());
        for mut contact in contacts {
            contact.id = self.fresh_id(&contact.tenant, &contact.title)?;
            contact.created_at = now_epoch_ms();
            contact.refresh_attributes();

            self.store
                .save_contact(&contact.tenant, CollectionKind::Active, &contact)?;
            self.register_content(&contact)?;
            self.audit
                .record(&contact, &contact.user, &ContactChange::Created)?;
            saved.push(contact);
        }

        info!(
            "event=contact_import module=service status=ok imported={} tenants={}",
            saved.len(),
            provisioned.len()
        );
        Ok(saved)
    }

    /// Resolves `ids` against the active collection for export.
    ///
    /// Keeps request order; unknown ids are skipped.
    pub fn contacts_for_export(&self, tenant: &str, ids: &[String]) -> ServiceResult<Vec<Contact>> {
        self.require_tenant("contact_export", tenant)?;
        self.require_collection("contact_export", tenant, CollectionKind::Active)?;

        let lookups = ids
            .iter()
            .map(|id| self.store.get_contact(tenant, CollectionKind::Active, id))
            .collect::<Result<Vec<Option<Contact>>, _>>()?;
        let contacts: Vec<Contact> = lookups.into_iter().flatten().collect();

        info!(
            "event=contact_export module=service status=ok tenant={tenant} requested={} resolved={}",
            ids.len(),
            contacts.len()
        );
        Ok(contacts)
    }

    /// Audit trail of one contact, oldest first.
    pub fn contact_events(&self, tenant: &str, contact_id: &str) -> ServiceResult<Vec<ContactEvent>> {
        self.require_tenant("contact_events", tenant)?;
        Ok(self
            .audit
            .log()
            .list_events(&EventListQuery::for_contact(tenant, contact_id))?)
    }

    /// Audit trail of a whole tenant, oldest first.
    pub fn tenant_events(&self, tenant: &str) -> ServiceResult<Vec<ContactEvent>> {
        self.require_tenant("tenant_events", tenant)?;
        Ok(self
            .audit
            .log()
            .list_events(&EventListQuery::for_tenant(tenant))?)
    }

    /// Runs a query against the tenant's active collection.
    pub fn search(&self, request: &SearchRequest) -> ServiceResult<Vec<Contact>> {
        ContactSearch::new(&self.store)
            .with_guard(self.pipe_guard)
            .search(request)
    }

    /// Groups active contacts into duplicate candidate clusters.
    pub fn find_duplicates(&self, tenant: &str) -> ServiceResult<DuplicateClusters> {
        DuplicateDetector::new(&self.store).find_duplicates(tenant)
    }

    fn soft_delete_loaded(&self, contact: &Contact, user: &str) -> ServiceResult<()> {
        self.store.move_contact(
            &contact.tenant,
            CollectionKind::Active,
            CollectionKind::Deleted,
            &contact.id,
        )?;
        self.audit.record(contact, user, &ContactChange::Deleted)?;
        self.registry.remove_tags(&contact.tenant, &contact.tags)?;
        Ok(())
    }

    fn register_content(&self, contact: &Contact) -> ServiceResult<()> {
        self.registry.add_tags(&contact.tenant, &contact.tags)?;
        self.registry
            .add_labels(&contact.tenant, &prop_keys(&contact.props))?;
        Ok(())
    }

    fn load(&self, tenant: &str, kind: CollectionKind, id: &str) -> ServiceResult<Contact> {
        self.store
            .get_contact(tenant, kind, id)?
            .ok_or_else(|| ContactServiceError::not_found(tenant, kind, id))
    }

    /// Draws an id that is free in both collections of `tenant`.
    fn fresh_id(&self, tenant: &str, title: &str) -> ServiceResult<ContactId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = generate_contact_id(title);
            let taken = self
                .store
                .get_contact(tenant, CollectionKind::Active, &candidate)?
                .is_some()
                || self
                    .store
                    .get_contact(tenant, CollectionKind::Deleted, &candidate)?
                    .is_some();
            if !taken {
                return Ok(candidate);
            }
        }
        Err(ContactServiceError::validation(
            "could not allocate a unique contact id",
        ))
    }

    fn require_tenant(&self, event: &str, tenant: &str) -> ServiceResult<()> {
        if tenant.trim().is_empty() {
            warn!("event={event} module=service status=error error_code=tenant_empty");
            return Err(ContactServiceError::validation("tenant name is empty"));
        }
        Ok(())
    }

    fn require_collection(&self, event: &str, tenant: &str, kind: CollectionKind) -> ServiceResult<()> {
        if self.store.collection_exists(tenant, kind)? {
            return Ok(());
        }
        warn!(
            "event={event} module=service status=error error_code=schema_missing tenant={tenant} collection={kind}"
        );
        Err(ContactServiceError::SchemaMissing {
            tenant: tenant.to_string(),
            kind,
        })
    }

    /// Shared preconditions of operations touching both collections.
    fn require_move_target(&self, event: &str, tenant: &str, id: &str) -> ServiceResult<()> {
        self.require_tenant(event, tenant)?;
        self.require_collection(event, tenant, CollectionKind::Active)?;
        self.require_collection(event, tenant, CollectionKind::Deleted)?;
        if id.trim().is_empty() {
            return Err(ContactServiceError::validation("contact id is empty"));
        }
        Ok(())
    }
}

/// Target tags followed by source tags the target lacks.
pub fn merged_tags(target: &[String], source: &[String]) -> Vec<String> {
    let mut merged = target.to_vec();
    for tag in source {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// Target props plus source props under keys the target lacks.
pub fn merged_props(
    target: &BTreeMap<String, String>,
    source: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = target.clone();
    for (key, value) in source {
        merged
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    merged
}

fn prop_keys(props: &BTreeMap<String, String>) -> Vec<String> {
    props.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::{merged_props, merged_tags};
    use std::collections::BTreeMap;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn merged_tags_append_only_missing_source_tags() {
        assert_eq!(
            merged_tags(&strings(&["a", "b"]), &strings(&["b", "c"])),
            strings(&["a", "b", "c"])
        );
    }

    #[test]
    fn merged_props_keep_target_value_on_conflict() {
        let target = BTreeMap::from([("x".to_string(), "1".to_string())]);
        let source = BTreeMap::from([
            ("x".to_string(), "2".to_string()),
            ("y".to_string(), "3".to_string()),
        ]);
        let merged = merged_props(&target, &source);
        assert_eq!(merged.get("x").map(String::as_str), Some("1"));
        assert_eq!(merged.get("y").map(String::as_str), Some("3"));
        assert_eq!(merged.len(), 2);
    }
}
