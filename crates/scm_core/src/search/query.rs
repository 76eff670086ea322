//! Boolean search over contact attribute strings.
//!
//! # Responsibility
//! - Parse `a&b` (all tokens) and `a|b` (any token) expressions.
//! - Restrict matches to records carrying every requested tag.
//! - Sort results by title.
//!
//! # Invariants
//! - Only the active collection is searched.
//! - Matching is case-insensitive substring matching on `Contact::attributes`.
//! - Ordering is byte order of the title, ties broken by id.

use crate::model::contact::Contact;
use crate::repo::contact_repo::{CollectionKind, RecordStore};
use crate::service::error::{ContactServiceError, ServiceResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};

const AND_SEPARATOR: char = '&';
const OR_SEPARATOR: char = '|';
const LEGACY_ESCAPED_PIPE: &str = "\\|";

/// Title ordering requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrientation {
    #[default]
    Asc,
    Desc,
}

/// How expressions without `&` pick between any-token and whole-expression
/// matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeGuard {
    /// Any-token matching unless the expression contains the literal `\|`;
    /// then the whole expression is one substring. Matches the behaviour of
    /// earlier deployments.
    #[default]
    Legacy,
    /// Any-token matching only when the expression contains `|`.
    Strict,
}

/// Parsed text part of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    All(Vec<String>),
    Any(Vec<String>),
    Whole(String),
}

impl TextMatch {
    /// Parses `expression`; returns `None` for a blank expression.
    pub fn parse(expression: &str, guard: PipeGuard) -> Option<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return None;
        }

        if expression.contains(AND_SEPARATOR) {
            return Some(Self::All(split_tokens(expression, AND_SEPARATOR)));
        }

        let any_token = match guard {
            PipeGuard::Legacy => !expression.contains(LEGACY_ESCAPED_PIPE),
            PipeGuard::Strict => expression.contains(OR_SEPARATOR),
        };
        if any_token {
            Some(Self::Any(split_tokens(expression, OR_SEPARATOR)))
        } else {
            Some(Self::Whole(expression.to_lowercase()))
        }
    }

    /// Tests a lower-cased attribute string.
    pub fn matches(&self, attributes: &str) -> bool {
        let attributes = attributes.to_lowercase();
        match self {
            Self::All(tokens) => tokens.iter().all(|token| attributes.contains(token.as_str())),
            Self::Any(tokens) => tokens.iter().any(|token| attributes.contains(token.as_str())),
            Self::Whole(text) => attributes.contains(text.as_str()),
        }
    }
}

/// Search input over one tenant's active collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub tenant: String,
    #[serde(default)]
    pub query: String,
    /// Tags every result must carry.
    #[serde(default)]
    pub filter: Vec<String>,
    #[serde(default)]
    pub sort: SortOrientation,
}

impl SearchRequest {
    pub fn new(tenant: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_filter<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.filter = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sort(mut self, sort: SortOrientation) -> Self {
        self.sort = sort;
        self
    }
}

/// Read-only query engine over a record store.
pub struct ContactSearch<S: RecordStore> {
    store: S,
    guard: PipeGuard,
}

impl<S: RecordStore> ContactSearch<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            guard: PipeGuard::default(),
        }
    }

    pub fn with_guard(mut self, guard: PipeGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Runs `request` against the tenant's active collection.
    pub fn search(&self, request: &SearchRequest) -> ServiceResult<Vec<Contact>> {
        if request.tenant.trim().is_empty() {
            warn!("event=contact_search module=search status=error error_code=tenant_empty");
            return Err(ContactServiceError::validation("tenant name is empty"));
        }
        if !self
            .store
            .collection_exists(&request.tenant, CollectionKind::Active)?
        {
            warn!(
                "event=contact_search module=search status=error error_code=schema_missing tenant={}",
                request.tenant
            );
            return Err(ContactServiceError::SchemaMissing {
                tenant: request.tenant.clone(),
                kind: CollectionKind::Active,
            });
        }

        let contacts = self
            .store
            .list_contacts(&request.tenant, CollectionKind::Active)?;
        let scanned = contacts.len();
        let results = apply_search(contacts, request, self.guard);
        info!(
            "event=contact_search module=search status=ok tenant={} scanned={} matched={} filter_tags={}",
            request.tenant,
            scanned,
            results.len(),
            request.filter.len()
        );
        Ok(results)
    }
}

/// Applies text matching, tag filtering and ordering to `contacts`.
pub fn apply_search(
    contacts: Vec<Contact>,
    request: &SearchRequest,
    guard: PipeGuard,
) -> Vec<Contact> {
    let text_match = TextMatch::parse(&request.query, guard);
    let mut results: Vec<Contact> = contacts
        .into_iter()
        .filter(|contact| {
            text_match
                .as_ref()
                .map_or(true, |text| text.matches(&contact.attributes))
        })
        .filter(|contact| contact.has_all_tags(&request.filter))
        .collect();
    sort_by_title(&mut results, request.sort);
    results
}

pub fn sort_by_title(contacts: &mut [Contact], sort: SortOrientation) {
    contacts.sort_by(|left, right| {
        let ordering = left
            .title
            .as_bytes()
            .cmp(right.title.as_bytes())
            .then_with(|| left.id.cmp(&right.id));
        match sort {
            SortOrientation::Asc => ordering,
            SortOrientation::Desc => ordering.reverse(),
        }
    });
}

fn split_tokens(expression: &str, separator: char) -> Vec<String> {
    expression
        .split(separator)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{PipeGuard, TextMatch};

    #[test]
    fn ampersand_takes_priority_over_pipe() {
        assert_eq!(
            TextMatch::parse("Acme & sales|x", PipeGuard::Strict),
            Some(TextMatch::All(vec!["acme".to_string(), "sales|x".to_string()]))
        );
    }

    #[test]
    fn blank_expression_has_no_text_match() {
        assert_eq!(TextMatch::parse("   ", PipeGuard::Legacy), None);
    }

    #[test]
    fn guards_differ_only_on_escaped_pipe_and_plain_words() {
        assert_eq!(
            TextMatch::parse("acme", PipeGuard::Legacy),
            Some(TextMatch::Any(vec!["acme".to_string()]))
        );
        assert_eq!(
            TextMatch::parse("acme", PipeGuard::Strict),
            Some(TextMatch::Whole("acme".to_string()))
        );
        assert_eq!(
            TextMatch::parse("acme\\|beta", PipeGuard::Legacy),
            Some(TextMatch::Whole("acme\\|beta".to_string()))
        );
        assert_eq!(
            TextMatch::parse("acme\\|beta", PipeGuard::Strict),
            Some(TextMatch::Any(vec!["acme\\".to_string(), "beta".to_string()]))
        );
    }

    #[test]
    fn all_and_any_semantics() {
        let all = TextMatch::parse("acme&sales", PipeGuard::Legacy).unwrap();
        assert!(all.matches("acme corp sales"));
        assert!(!TextMatch::parse("acme&support", PipeGuard::Legacy)
            .unwrap()
            .matches("acme corp sales"));

        let any = TextMatch::parse("ACME|beta", PipeGuard::Strict).unwrap();
        assert!(any.matches("beta inc"));
        assert!(!any.matches("gamma llc"));
    }
}
