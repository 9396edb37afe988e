//! Core data types for the todograph task lists.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of an item name.
pub const MAX_ITEM_NAME_LEN: usize = 200;

/// Maximum length of an item description.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Maximum length of a list name.
pub const MAX_LIST_NAME_LEN: usize = 100;

/// A named collection of items owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct List {
    /// Unique identifier: "ls-" + 10 hex chars
    pub id: String,

    /// Display name
    pub name: String,

    /// Identity of the user that owns the list
    pub owner: String,

    /// When created
    pub created_at: DateTime<Utc>,
}

impl List {
    /// Validate the list's fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.chars().count() > MAX_LIST_NAME_LEN {
            return Err(ValidationError::NameTooLong(MAX_LIST_NAME_LEN));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidCharacters);
        }
        if self.owner.trim().is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        Ok(())
    }
}

/// A unit of work inside a list.
///
/// Dependency edges are not stored on the item itself; they live in
/// [`Edge`] records and are assembled into adjacency maps by
/// [`ListGraph`](crate::ListGraph).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Unique identifier: "it-" + 10 hex chars
    pub id: String,

    /// Owning list
    pub list_id: String,

    /// Short description of the work
    pub name: String,

    /// Optional longer description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current state
    pub status: Status,

    /// Day after which the item counts as expired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,

    /// When created
    pub created_at: DateTime<Utc>,

    /// Last modification
    pub updated_at: DateTime<Utc>,

    /// When completed (if status == Completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Item status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NotStarted,
    InProgress,
    Completed,
    Expired,
}

impl Status {
    /// All statuses, in display order.
    pub const ALL: [Status; 4] = [Status::NotStarted, Status::InProgress, Status::Completed, Status::Expired];

    /// Wire/storage name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "NOT_STARTED",
            Status::InProgress => "IN_PROGRESS",
            Status::Completed => "COMPLETED",
            Status::Expired => "EXPIRED",
        }
    }

    /// Parse a status name, accepting either `NOT_STARTED` or `not_started`.
    pub fn parse(s: &str) -> Option<Status> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Status::ALL.into_iter().find(|status| status.as_str() == upper)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dependency edge: `from_id` cannot complete until `to_id` completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    /// List both endpoints belong to
    pub list_id: String,

    /// The item that has the dependency
    pub from_id: String,

    /// The item being depended on
    pub to_id: String,

    /// When the edge was created
    pub created_at: DateTime<Utc>,

    /// Tombstone marker for deletion
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// Validation errors for lists and items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("name exceeds {0} characters")]
    NameTooLong(usize),
    #[error("name contains control characters")]
    InvalidCharacters,
    #[error("description exceeds 1000 characters")]
    DescriptionTooLong,
    #[error("owner cannot be empty")]
    EmptyOwner,
    #[error("updated_at cannot be before created_at")]
    InvalidTimestamp,
    #[error("completed_at set but status is not COMPLETED")]
    CompletedAtWithoutCompletedStatus,
    #[error("status is COMPLETED but completed_at is missing")]
    CompletedStatusWithoutCompletedAt,
}

impl Item {
    /// Validate the item's fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.chars().count() > MAX_ITEM_NAME_LEN {
            return Err(ValidationError::NameTooLong(MAX_ITEM_NAME_LEN));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidCharacters);
        }

        if let Some(description) = &self.description
            && description.chars().count() > MAX_DESCRIPTION_LEN
        {
            return Err(ValidationError::DescriptionTooLong);
        }

        if self.updated_at < self.created_at {
            return Err(ValidationError::InvalidTimestamp);
        }

        match (self.status, self.completed_at) {
            (Status::Completed, None) => Err(ValidationError::CompletedStatusWithoutCompletedAt),
            (status, Some(_)) if status != Status::Completed => Err(ValidationError::CompletedAtWithoutCompletedStatus),
            _ => Ok(()),
        }
    }
}
