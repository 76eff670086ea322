//! Service-level error taxonomy.
//!
//! Every variant carries an [`ErrorCause`] so the transport layer can pick a
//! response code without inspecting messages.

use crate::access::AccessDenied;
use crate::model::contact::{ContactId, ContactValidationError};
use crate::repo::contact_repo::{CollectionKind, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ContactServiceError>;

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCause {
    User,
    Server,
}

/// Errors surfaced by lifecycle, search and duplicate operations.
#[derive(Debug)]
pub enum ContactServiceError {
    /// Empty or malformed required input.
    Validation(String),
    /// Record absent from the collection the operation reads.
    NotFound {
        tenant: String,
        kind: CollectionKind,
        id: ContactId,
    },
    /// Tenant collection was never provisioned.
    SchemaMissing {
        tenant: String,
        kind: CollectionKind,
    },
    /// Caller-supplied id collides with an active record.
    AlreadyExists(ContactId),
    AccessDenied(AccessDenied),
    Repo(RepoError),
}

impl ContactServiceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(tenant: &str, kind: CollectionKind, id: &str) -> Self {
        Self::NotFound {
            tenant: tenant.to_string(),
            kind,
            id: id.to_string(),
        }
    }

    pub fn cause(&self) -> ErrorCause {
        match self {
            Self::Validation(_)
            | Self::NotFound { .. }
            | Self::AlreadyExists(_)
            | Self::AccessDenied(_) => ErrorCause::User,
            Self::SchemaMissing { .. } | Self::Repo(_) => ErrorCause::Server,
        }
    }

    /// HTTP-equivalent status classification.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::AlreadyExists(_) => 400,
            Self::AccessDenied(_) => 403,
            Self::NotFound { .. } => 404,
            Self::SchemaMissing { .. } | Self::Repo(_) => 500,
        }
    }
}

impl Display for ContactServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::NotFound { tenant, kind, id } => {
                write!(f, "contact `{id}` not found in {tenant}/{kind}")
            }
            Self::SchemaMissing { tenant, kind } => {
                write!(f, "collection {tenant}/{kind} does not exist")
            }
            Self::AlreadyExists(id) => write!(f, "contact `{id}` already exists"),
            Self::AccessDenied(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContactServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AccessDenied(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ContactServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { tenant, kind, id } => Self::NotFound { tenant, kind, id },
            other => Self::Repo(other),
        }
    }
}

impl From<ContactValidationError> for ContactServiceError {
    fn from(value: ContactValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<AccessDenied> for ContactServiceError {
    fn from(value: AccessDenied) -> Self {
        Self::AccessDenied(value)
    }
}
