use scm_core::db::open_db_in_memory;
use scm_core::{
    CollectionKind, Contact, RecordStore, RepoError, SqliteRecordStore, SqliteTenantRegistry,
    TenantRegistry,
};

const TENANT: &str = "acme";

fn stored(id: &str, title: &str, created_at: i64) -> Contact {
    let mut contact = Contact::new(TENANT, title);
    contact.id = id.to_string();
    contact.created_at = created_at;
    contact.tags = vec!["vip".to_string()];
    contact
        .props
        .insert("city".to_string(), "Ljubljana".to_string());
    contact.refresh_attributes();
    contact
}

#[test]
fn provisioning_controls_collection_existence() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    assert!(!store.collection_exists(TENANT, CollectionKind::Active).unwrap());
    store
        .create_collection(TENANT, CollectionKind::Active)
        .unwrap();
    assert!(store.collection_exists(TENANT, CollectionKind::Active).unwrap());
    assert!(!store.collection_exists(TENANT, CollectionKind::Deleted).unwrap());

    store.provision_tenant(TENANT).unwrap();
    store.provision_tenant(TENANT).unwrap();
    assert!(store.collection_exists(TENANT, CollectionKind::Deleted).unwrap());
}

#[test]
fn save_is_an_upsert_and_lists_in_creation_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store.provision_tenant(TENANT).unwrap();

    let later = stored("b-1", "Later", 20);
    let earlier = stored("a-1", "Earlier", 10);
    store.save_contact(TENANT, CollectionKind::Active, &later).unwrap();
    store.save_contact(TENANT, CollectionKind::Active, &earlier).unwrap();

    let mut renamed = later.clone();
    renamed.title = "Renamed".to_string();
    store.save_contact(TENANT, CollectionKind::Active, &renamed).unwrap();

    let listed = store.list_contacts(TENANT, CollectionKind::Active).unwrap();
    assert_eq!(listed, vec![earlier, renamed]);
}

#[test]
fn saving_into_the_other_collection_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store.provision_tenant(TENANT).unwrap();

    let contact = stored("a-1", "Acme", 10);
    store.save_contact(TENANT, CollectionKind::Active, &contact).unwrap();
    let err = store
        .save_contact(TENANT, CollectionKind::Deleted, &contact)
        .unwrap_err();
    assert!(matches!(err, RepoError::CollectionConflict { .. }));
}

#[test]
fn move_and_remove_report_missing_records() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store.provision_tenant(TENANT).unwrap();
    let contact = stored("a-1", "Acme", 10);
    store.save_contact(TENANT, CollectionKind::Active, &contact).unwrap();

    store
        .move_contact(TENANT, CollectionKind::Active, CollectionKind::Deleted, "a-1")
        .unwrap();
    assert_eq!(
        store
            .get_contact(TENANT, CollectionKind::Deleted, "a-1")
            .unwrap(),
        Some(contact)
    );

    let err = store
        .move_contact(TENANT, CollectionKind::Active, CollectionKind::Deleted, "a-1")
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));

    store
        .remove_contact(TENANT, CollectionKind::Deleted, "a-1")
        .unwrap();
    let err = store
        .remove_contact(TENANT, CollectionKind::Deleted, "a-1")
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
}

#[test]
fn tenants_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store.provision_tenant(TENANT).unwrap();
    store.provision_tenant("beta").unwrap();

    let contact = stored("shared-id", "Acme", 10);
    store.save_contact(TENANT, CollectionKind::Active, &contact).unwrap();
    let mut other = contact.clone();
    other.tenant = "beta".to_string();
    store.save_contact("beta", CollectionKind::Deleted, &other).unwrap();

    assert!(store
        .get_contact("beta", CollectionKind::Active, "shared-id")
        .unwrap()
        .is_none());
    assert_eq!(store.list_contacts(TENANT, CollectionKind::Active).unwrap().len(), 1);
}

#[test]
fn saving_into_an_unprovisioned_collection_fails() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let err = store
        .save_contact(TENANT, CollectionKind::Active, &stored("a-1", "Acme", 10))
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn tag_registry_counts_usage() {
    let conn = open_db_in_memory().unwrap();
    let registry = SqliteTenantRegistry::try_new(&conn).unwrap();
    let tags = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();

    registry.add_tags(TENANT, &tags(&["vip", "lead"])).unwrap();
    registry.add_tags(TENANT, &tags(&["vip"])).unwrap();
    registry.remove_tags(TENANT, &tags(&["vip", "lead"])).unwrap();
    assert_eq!(registry.list_tags(TENANT).unwrap(), vec!["vip"]);

    registry.remove_tags(TENANT, &tags(&["vip", "unknown"])).unwrap();
    assert!(registry.list_tags(TENANT).unwrap().is_empty());

    registry.add_labels(TENANT, &tags(&["email", "city", "email"])).unwrap();
    assert_eq!(registry.list_labels(TENANT).unwrap(), vec!["city", "email"]);
    assert!(registry.list_labels("beta").unwrap().is_empty());
}
