//! Duplicate candidate detection.
//!
//! # Responsibility
//! - Cluster active contacts sharing a title (case-insensitive).
//! - Cluster active contacts sharing an `email` property, unless any member
//!   already sits in a title cluster.
//!
//! # Invariants
//! - Read-only: never writes to the store.
//! - An e-mail cluster overlapping a title cluster is dropped whole, not merged.

use crate::model::contact::Contact;
use crate::repo::contact_repo::{CollectionKind, RecordStore};
use crate::service::error::{ContactServiceError, ServiceResult};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

/// Cluster key (lower-cased title or e-mail) -> members in store order.
pub type DuplicateClusters = BTreeMap<String, Vec<Contact>>;

pub struct DuplicateDetector<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> DuplicateDetector<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn find_duplicates(&self, tenant: &str) -> ServiceResult<DuplicateClusters> {
        if tenant.trim().is_empty() {
            return Err(ContactServiceError::validation("tenant name is empty"));
        }
        if !self.store.collection_exists(tenant, CollectionKind::Active)? {
            warn!(
                "event=contact_duplicates module=service status=error error_code=schema_missing tenant={tenant}"
            );
            return Err(ContactServiceError::SchemaMissing {
                tenant: tenant.to_string(),
                kind: CollectionKind::Active,
            });
        }

        let contacts = self.store.list_contacts(tenant, CollectionKind::Active)?;
        let clusters = cluster_duplicates(&contacts);
        info!(
            "event=contact_duplicates module=service status=ok tenant={tenant} scanned={} clusters={}",
            contacts.len(),
            clusters.len()
        );
        Ok(clusters)
    }
}

/// Groups `contacts` into duplicate clusters.
pub fn cluster_duplicates(contacts: &[Contact]) -> DuplicateClusters {
    let mut clusters: DuplicateClusters = group_by(contacts, |contact| {
        Some(contact.title.to_lowercase())
    })
    .into_iter()
    .filter(|(_, members)| members.len() > 1)
    .collect();

    let clustered_ids: HashSet<String> = clusters
        .values()
        .flatten()
        .map(|contact| contact.id.clone())
        .collect();

    let email_groups = group_by(contacts, |contact| contact.email().map(str::to_lowercase));
    for (email, members) in email_groups {
        if members.len() < 2 {
            continue;
        }
        if members
            .iter()
            .any(|contact| clustered_ids.contains(&contact.id))
        {
            continue;
        }
        clusters.entry(email).or_default().extend(members);
    }

    clusters
}

fn group_by<F>(contacts: &[Contact], key: F) -> BTreeMap<String, Vec<Contact>>
where
    F: Fn(&Contact) -> Option<String>,
{
    let mut groups: BTreeMap<String, Vec<Contact>> = BTreeMap::new();
    for contact in contacts {
        if let Some(value) = key(contact) {
            groups.entry(value).or_default().push(contact.clone());
        }
    }
    groups
}
