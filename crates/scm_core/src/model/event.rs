//! Audit event model.
//!
//! # Responsibility
//! - Define the closed set of persisted event states.
//! - Model whole-record transitions and field-level diffs as one tagged type.
//!
//! # Invariants
//! - Every `ContactChange` maps to exactly one `EventState`.
//! - Events reference contacts by id only; they never own the record.

use crate::model::contact::ContactId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Persisted event state (flat storage tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    Created,
    Updated,
    Deleted,
    TagAdd,
    TagRemoved,
    PropAdd,
    PropRemoved,
    Reverted,
    Duplicated,
    Merged,
    MergeTagAdd,
    MergePropAdd,
    MergeUpdated,
}

impl EventState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::TagAdd => "TAG_ADD",
            Self::TagRemoved => "TAG_REMOVED",
            Self::PropAdd => "PROP_ADD",
            Self::PropRemoved => "PROP_REMOVED",
            Self::Reverted => "REVERTED",
            Self::Duplicated => "DUPLICATED",
            Self::Merged => "MERGED",
            Self::MergeTagAdd => "MERGE_TAG_ADD",
            Self::MergePropAdd => "MERGE_PROP_ADD",
            Self::MergeUpdated => "MERGE_UPDATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let state = match value {
            "CREATED" => Self::Created,
            "UPDATED" => Self::Updated,
            "DELETED" => Self::Deleted,
            "TAG_ADD" => Self::TagAdd,
            "TAG_REMOVED" => Self::TagRemoved,
            "PROP_ADD" => Self::PropAdd,
            "PROP_REMOVED" => Self::PropRemoved,
            "REVERTED" => Self::Reverted,
            "DUPLICATED" => Self::Duplicated,
            "MERGED" => Self::Merged,
            "MERGE_TAG_ADD" => Self::MergeTagAdd,
            "MERGE_PROP_ADD" => Self::MergePropAdd,
            "MERGE_UPDATED" => Self::MergeUpdated,
            _ => return None,
        };
        Some(state)
    }
}

impl Display for EventState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level event kinds; each carries a key and before/after values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldState {
    Updated,
    TagAdd,
    TagRemoved,
    PropAdd,
    PropRemoved,
    MergeTagAdd,
    MergePropAdd,
    MergeUpdated,
}

impl FieldState {
    pub fn event_state(self) -> EventState {
        match self {
            Self::Updated => EventState::Updated,
            Self::TagAdd => EventState::TagAdd,
            Self::TagRemoved => EventState::TagRemoved,
            Self::PropAdd => EventState::PropAdd,
            Self::PropRemoved => EventState::PropRemoved,
            Self::MergeTagAdd => EventState::MergeTagAdd,
            Self::MergePropAdd => EventState::MergePropAdd,
            Self::MergeUpdated => EventState::MergeUpdated,
        }
    }
}

/// What happened to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactChange {
    Created,
    Duplicated,
    Deleted,
    Reverted,
    /// The referenced contact was merged into `into` and removed.
    Merged { into: ContactId },
    Field {
        state: FieldState,
        prop_key: String,
        prev_state: String,
        current_state: String,
    },
}

impl ContactChange {
    pub fn field(
        state: FieldState,
        prop_key: impl Into<String>,
        prev_state: impl Into<String>,
        current_state: impl Into<String>,
    ) -> Self {
        Self::Field {
            state,
            prop_key: prop_key.into(),
            prev_state: prev_state.into(),
            current_state: current_state.into(),
        }
    }

    pub fn state(&self) -> EventState {
        match self {
            Self::Created => EventState::Created,
            Self::Duplicated => EventState::Duplicated,
            Self::Deleted => EventState::Deleted,
            Self::Reverted => EventState::Reverted,
            Self::Merged { .. } => EventState::Merged,
            Self::Field { state, .. } => state.event_state(),
        }
    }

    /// Rebuilds a change from its flat storage columns.
    ///
    /// Returns `None` when the columns do not form a valid change.
    pub fn from_columns(
        state: EventState,
        prop_key: Option<String>,
        prev_state: Option<String>,
        current_state: Option<String>,
    ) -> Option<Self> {
        let field_state = match state {
            EventState::Created => return Some(Self::Created),
            EventState::Duplicated => return Some(Self::Duplicated),
            EventState::Deleted => return Some(Self::Deleted),
            EventState::Reverted => return Some(Self::Reverted),
            EventState::Merged => return current_state.map(|into| Self::Merged { into }),
            EventState::Updated => FieldState::Updated,
            EventState::TagAdd => FieldState::TagAdd,
            EventState::TagRemoved => FieldState::TagRemoved,
            EventState::PropAdd => FieldState::PropAdd,
            EventState::PropRemoved => FieldState::PropRemoved,
            EventState::MergeTagAdd => FieldState::MergeTagAdd,
            EventState::MergePropAdd => FieldState::MergePropAdd,
            EventState::MergeUpdated => FieldState::MergeUpdated,
        };

        Some(Self::Field {
            state: field_state,
            prop_key: prop_key?,
            prev_state: prev_state.unwrap_or_default(),
            current_state: current_state.unwrap_or_default(),
        })
    }
}

/// One persisted audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEvent {
    /// Insertion order within the store.
    pub seq: i64,
    pub tenant: String,
    /// Acting user.
    pub user: String,
    pub contact_id: ContactId,
    pub change: ContactChange,
    /// Unix epoch milliseconds.
    pub recorded_at: i64,
}

impl ContactEvent {
    pub fn state(&self) -> EventState {
        self.change.state()
    }
}
