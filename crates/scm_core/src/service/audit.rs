//! Audit recorder.
//!
//! # Responsibility
//! - Compute field-level diffs between two versions of a contact.
//! - Append whole-record and field-level events to the audit log.
//!
//! # Invariants
//! - Diffs are computed from the values passed in; callers pass the
//!   pre-mutation record so events describe what is about to change.
//! - The recorder only appends; it never edits or retracts events.

use crate::model::contact::Contact;
use crate::model::event::{ContactChange, FieldState};
use crate::repo::contact_repo::RepoResult;
use crate::repo::event_repo::AuditLog;
use std::collections::BTreeMap;

/// Property key used for title change events.
pub const TITLE_PROP_KEY: &str = "Title";

/// Appends lifecycle events for one tenant store.
pub struct AuditRecorder<A: AuditLog> {
    log: A,
}

impl<A: AuditLog> AuditRecorder<A> {
    pub fn new(log: A) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &A {
        &self.log
    }

    /// Appends one event against `contact`.
    pub fn record(&self, contact: &Contact, user: &str, change: &ContactChange) -> RepoResult<i64> {
        self.log
            .append_event(&contact.tenant, user, &contact.id, change)
    }

    /// Emits an `UPDATED` title event when the title changes.
    pub fn record_title_change(
        &self,
        existing: &Contact,
        incoming_title: &str,
        user: &str,
    ) -> RepoResult<bool> {
        if existing.title == incoming_title {
            return Ok(false);
        }
        self.record(
            existing,
            user,
            &ContactChange::field(
                FieldState::Updated,
                TITLE_PROP_KEY,
                existing.title.as_str(),
                incoming_title,
            ),
        )?;
        Ok(true)
    }

    /// Emits `TAG_ADD` / `TAG_REMOVED` for `existing` -> `incoming`.
    pub fn diff_tags(&self, existing: &Contact, incoming: &Contact, user: &str) -> RepoResult<usize> {
        self.append_all(existing, user, tag_changes(&existing.tags, &incoming.tags))
    }

    /// Emits `PROP_ADD` / `PROP_REMOVED` for `existing` -> `incoming`.
    pub fn diff_props(
        &self,
        existing: &Contact,
        incoming: &Contact,
        user: &str,
    ) -> RepoResult<usize> {
        self.append_all(existing, user, prop_changes(&existing.props, &incoming.props))
    }

    /// Emits `MERGE_TAG_ADD` for tags `source` brings into `target`.
    pub fn diff_tags_merging(
        &self,
        target: &Contact,
        source: &Contact,
        user: &str,
    ) -> RepoResult<usize> {
        self.append_all(target, user, merge_tag_changes(&target.tags, &source.tags))
    }

    /// Emits `MERGE_PROP_ADD` / `MERGE_UPDATED` for props of `source`.
    /// See [`merge_prop_changes`] for the reversed `MERGE_UPDATED` orientation.
    pub fn diff_props_merging(
        &self,
        target: &Contact,
        source: &Contact,
        user: &str,
    ) -> RepoResult<usize> {
        self.append_all(target, user, merge_prop_changes(&target.props, &source.props))
    }

    fn append_all(
        &self,
        contact: &Contact,
        user: &str,
        changes: Vec<ContactChange>,
    ) -> RepoResult<usize> {
        for change in &changes {
            self.record(contact, user, change)?;
        }
        Ok(changes.len())
    }
}

/// Tag additions (in `incoming` order) followed by removals (in `existing` order).
pub fn tag_changes(existing: &[String], incoming: &[String]) -> Vec<ContactChange> {
    let added = incoming
        .iter()
        .filter(|tag| !existing.contains(tag))
        .map(|tag| ContactChange::field(FieldState::TagAdd, tag.as_str(), "", tag.as_str()));
    let removed = existing
        .iter()
        .filter(|tag| !incoming.contains(tag))
        .map(|tag| ContactChange::field(FieldState::TagRemoved, tag.as_str(), tag.as_str(), ""));
    added.chain(removed).collect()
}

/// New or changed keys become `PROP_ADD`; dropped keys become `PROP_REMOVED`.
pub fn prop_changes(
    existing: &BTreeMap<String, String>,
    incoming: &BTreeMap<String, String>,
) -> Vec<ContactChange> {
    let added = incoming
        .iter()
        .filter(|(key, value)| existing.get(*key) != Some(*value))
        .map(|(key, value)| {
            let previous = existing.get(key).map_or("", String::as_str);
            ContactChange::field(FieldState::PropAdd, key.as_str(), previous, value.as_str())
        });
    let removed = existing
        .iter()
        .filter(|(key, _)| !incoming.contains_key(*key))
        .map(|(key, value)| {
            ContactChange::field(FieldState::PropRemoved, key.as_str(), value.as_str(), "")
        });
    added.chain(removed).collect()
}

/// Source tags missing from `target`; a merge never removes tags.
pub fn merge_tag_changes(target: &[String], source: &[String]) -> Vec<ContactChange> {
    source
        .iter()
        .filter(|tag| !target.contains(tag))
        .map(|tag| ContactChange::field(FieldState::MergeTagAdd, tag.as_str(), "", tag.as_str()))
        .collect()
}

/// Source keys missing from `target` become `MERGE_PROP_ADD`. Keys present
/// on both sides with different values keep the target value and are
/// recorded as `MERGE_UPDATED`.
///
/// The `MERGE_UPDATED` orientation is deliberately reversed relative to
/// [`prop_changes`], where `prev_state` is the stored value. Here
/// `prev_state` holds the discarded source value and `current_state` the
/// kept target value. Consumers replaying a merge must not read
/// `prev_state` as the target's old value.
pub fn merge_prop_changes(
    target: &BTreeMap<String, String>,
    source: &BTreeMap<String, String>,
) -> Vec<ContactChange> {
    source
        .iter()
        .filter_map(|(key, value)| match target.get(key) {
            None => Some(ContactChange::field(
                FieldState::MergePropAdd,
                key.as_str(),
                "",
                value.as_str(),
            )),
            Some(kept) if kept != value => Some(ContactChange::field(
                FieldState::MergeUpdated,
                key.as_str(),
                value.as_str(),
                kept.as_str(),
            )),
            Some(_) => None,
        })
        .collect()
}
