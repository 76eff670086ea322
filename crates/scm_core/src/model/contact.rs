//! Contact domain model.
//!
//! # Responsibility
//! - Define the canonical contact record shared by every lifecycle path.
//! - Derive the searchable attribute string and human-readable ids.
//!
//! # Invariants
//! - `tags` never holds the same value twice; first-seen order is kept.
//! - `attributes` always reflects the current title, comments, tags and
//!   property values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

const SLUG_MAX_CHARS: usize = 48;
const ID_SUFFIX_CHARS: usize = 8;
const EMPTY_SLUG_FALLBACK: &str = "contact";

/// Property key the duplicate detector reads e-mail addresses from.
pub const EMAIL_PROP_KEY: &str = "email";

/// Tenant-scoped contact identifier (`<slug>-<suffix>`).
pub type ContactId = String;

/// Canonical contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub title: String,
    /// Owning user.
    pub user: String,
    pub tenant: String,
    pub comments: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub tags: Vec<String>,
    /// Property key -> value. Keys are case-sensitive.
    pub props: BTreeMap<String, String>,
    /// Lower-cased search substrate, see [`Contact::refresh_attributes`].
    pub attributes: String,
}

/// Validation failures for contact content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactValidationError {
    EmptyTenant,
    EmptyTitle,
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTenant => write!(f, "tenant name is empty"),
            Self::EmptyTitle => write!(f, "contact title is empty"),
        }
    }
}

impl Error for ContactValidationError {}

impl Contact {
    /// Creates an empty record for `tenant` with the given title.
    ///
    /// The id is left blank; the lifecycle manager assigns it on create.
    pub fn new(tenant: impl Into<String>, title: impl Into<String>) -> Self {
        let mut contact = Self {
            id: String::new(),
            title: title.into(),
            user: String::new(),
            tenant: tenant.into(),
            comments: String::new(),
            created_at: 0,
            tags: Vec::new(),
            props: BTreeMap::new(),
            attributes: String::new(),
        };
        contact.refresh_attributes();
        contact
    }

    /// Checks required content fields.
    pub fn validate(&self) -> Result<(), ContactValidationError> {
        if self.tenant.trim().is_empty() {
            return Err(ContactValidationError::EmptyTenant);
        }
        if self.title.trim().is_empty() {
            return Err(ContactValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Recomputes the attribute string from title, comments, tags and props.
    pub fn refresh_attributes(&mut self) {
        self.attributes = derive_attributes(&self.title, &self.comments, &self.tags, &self.props);
    }

    /// Returns whether every tag in `required` is present on this record.
    pub fn has_all_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag))
    }

    /// E-mail property value, when present.
    pub fn email(&self) -> Option<&str> {
        self.props.get(EMAIL_PROP_KEY).map(String::as_str)
    }
}

/// Normalized record produced by import-format parsers.
///
/// Missing optional fields default to empty values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub props: BTreeMap<String, String>,
}

impl ImportRecord {
    /// Converts into a contact without id; attributes are derived.
    pub fn into_contact(self) -> Contact {
        let mut contact = Contact {
            id: String::new(),
            title: self.title,
            user: self.user,
            tenant: self.tenant,
            comments: self.comments,
            created_at: 0,
            tags: normalize_tags(&self.tags),
            props: self.props,
            attributes: String::new(),
        };
        contact.refresh_attributes();
        contact
    }
}

/// Builds the lower-cased, space-joined search substrate.
pub fn derive_attributes(
    title: &str,
    comments: &str,
    tags: &[String],
    props: &BTreeMap<String, String>,
) -> String {
    std::iter::once(title)
        .chain(std::iter::once(comments))
        .chain(tags.iter().map(String::as_str))
        .chain(props.values().map(String::as_str))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Generates a fresh id: a title slug plus a random suffix.
pub fn generate_contact_id(title: &str) -> ContactId {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slugify(title), &suffix[..ID_SUFFIX_CHARS])
}

/// Lower-cases `title` and collapses every non `[a-z0-9]` run into `-`.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = NON_SLUG_RE.replace_all(&lowered, "-");
    let trimmed: String = slug
        .trim_matches('-')
        .chars()
        .take(SLUG_MAX_CHARS)
        .collect();
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() {
        EMPTY_SLUG_FALLBACK.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Trims tags, drops blanks and removes duplicates keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_string()))
        .map(str::to_string)
        .collect()
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::{derive_attributes, generate_contact_id, normalize_tags, slugify, Contact};
    use std::collections::BTreeMap;

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("  Jane  O'Doe, Ltd. "), "jane-o-doe-ltd");
        assert_eq!(slugify("***"), "contact");
    }

    #[test]
    fn slugify_caps_length_without_trailing_dash() {
        let slug = slugify(&"ab ".repeat(40));
        assert!(slug.chars().count() <= 48);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn generated_ids_are_readable_and_unique() {
        let first = generate_contact_id("Acme Corp");
        let second = generate_contact_id("Acme Corp");
        assert!(first.starts_with("acme-corp-"));
        assert_eq!(first.len(), "acme-corp-".len() + 8);
        assert_ne!(first, second);
    }

    #[test]
    fn attributes_join_all_searchable_fields_lowercased() {
        let mut props = BTreeMap::new();
        props.insert("city".to_string(), "Ljubljana".to_string());
        let tags = vec!["VIP".to_string()];
        let attributes = derive_attributes("Acme Corp", "Sales lead", &tags, &props);
        assert_eq!(attributes, "acme corp sales lead vip ljubljana");
    }

    #[test]
    fn normalize_tags_keeps_first_seen_order() {
        let tags = vec![
            " b ".to_string(),
            "a".to_string(),
            "b".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn validate_rejects_blank_title_and_tenant() {
        assert!(Contact::new("acme", "  ").validate().is_err());
        assert!(Contact::new("", "Jane").validate().is_err());
        assert!(Contact::new("acme", "Jane").validate().is_ok());
    }
}
