use rusqlite::Connection;
use scm_core::db::open_db_in_memory;
use scm_core::{
    Contact, ContactServiceError, DuplicateDetector, SqliteContactService, SqliteRecordStore,
};

const TENANT: &str = "acme";

fn provisioned_db() -> Connection {
    let conn = open_db_in_memory().unwrap();
    SqliteRecordStore::try_new(&conn)
        .unwrap()
        .provision_tenant(TENANT)
        .unwrap();
    conn
}

fn seed(service: &SqliteContactService<'_>, title: &str, email: Option<&str>) -> Contact {
    let mut contact = Contact::new(TENANT, title);
    if let Some(email) = email {
        contact.props.insert("email".to_string(), email.to_string());
    }
    service.create_contact(contact, "ana", false).unwrap()
}

#[test]
fn same_title_in_any_case_forms_one_cluster() {
    let conn = provisioned_db();
    let service = SqliteContactService::try_new(&conn).unwrap();
    seed(&service, "Jane Doe", None);
    seed(&service, "jane doe", None);
    seed(&service, "John Roe", None);

    let clusters = service.find_duplicates(TENANT).unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters["jane doe"].len(), 2);
    assert!(!clusters.contains_key("john roe"));
}

#[test]
fn email_cluster_is_kept_only_when_disjoint_from_title_clusters() {
    let conn = provisioned_db();
    let service = SqliteContactService::try_new(&conn).unwrap();
    seed(&service, "Jane Doe", Some("jane@acme.test"));
    seed(&service, "JANE DOE", None);
    seed(&service, "J. Doe", Some("Jane@Acme.test"));
    let first_bob = seed(&service, "Bob", Some("bob@acme.test"));
    let second_bob = seed(&service, "Robert", Some("BOB@acme.test"));

    let clusters = service.find_duplicates(TENANT).unwrap();
    let keys: Vec<&str> = clusters.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["bob@acme.test", "jane doe"]);

    let bob_ids: Vec<&str> = clusters["bob@acme.test"]
        .iter()
        .map(|contact| contact.id.as_str())
        .collect();
    assert_eq!(bob_ids, vec![first_bob.id.as_str(), second_bob.id.as_str()]);
}

#[test]
fn deleted_contacts_are_not_clustered() {
    let conn = provisioned_db();
    let service = SqliteContactService::try_new(&conn).unwrap();
    let first = seed(&service, "Jane Doe", None);
    seed(&service, "jane doe", None);
    service.soft_delete_contact(TENANT, &first.id, "ana").unwrap();

    assert!(service.find_duplicates(TENANT).unwrap().is_empty());
}

#[test]
fn detector_requires_a_provisioned_tenant() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let err = DuplicateDetector::new(store)
        .find_duplicates("nobody")
        .unwrap_err();
    assert!(matches!(err, ContactServiceError::SchemaMissing { .. }));
}
