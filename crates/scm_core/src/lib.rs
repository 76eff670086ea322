//! Contact lifecycle, audit and query engine.
//! Tenant-scoped records move between `active` and `deleted` collections,
//! every transition lands in an append-only audit trail.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use access::{require_tenant_access, AccessDenied, AccessPolicy, TenantAllowList};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::contact::{Contact, ContactId, ContactValidationError, ImportRecord};
pub use model::event::{ContactChange, ContactEvent, EventState, FieldState};
pub use repo::contact_repo::{
    CollectionKind, RecordStore, RepoError, RepoResult, SqliteRecordStore,
};
pub use repo::event_repo::{AuditLog, EventListQuery, SqliteAuditLog};
pub use repo::tenant_repo::{SqliteTenantRegistry, TenantRegistry};
pub use search::query::{ContactSearch, PipeGuard, SearchRequest, SortOrientation};
pub use service::contact_service::{ContactService, SqliteContactService};
pub use service::duplicates::{DuplicateClusters, DuplicateDetector};
pub use service::error::{ContactServiceError, ErrorCause, ServiceResult};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
