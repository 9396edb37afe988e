//! IPC protocol types for daemon communication.
//!
//! One JSON object per line in each direction. Every request that touches a
//! list carries the caller's identity.

use crate::config::DeletePolicy;
use crate::error::StoreError;
use crate::graph::Removal;
use crate::query::ItemQuery;
use crate::store::{ItemUpdate, NewItem};
use crate::sweep::SweepReport;
use crate::types::{Item, List, Status};
use crate::view::{DependencyRef, ItemView};
use serde::{Deserialize, Serialize};

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a list owned by the caller.
    CreateList { caller: String, name: String },

    /// Lists owned by the caller.
    Lists { caller: String },

    GetList { caller: String, list_id: String },

    RenameList {
        caller: String,
        list_id: String,
        name: String,
    },

    /// Delete a list with all its items.
    DeleteList { caller: String, list_id: String },

    /// Create a new item.
    CreateItem {
        caller: String,
        list_id: String,
        item: NewItem,
    },

    /// Update an existing item.
    UpdateItem {
        caller: String,
        list_id: String,
        item_id: String,
        update: ItemUpdate,
    },

    /// Set item status.
    SetStatus {
        caller: String,
        list_id: String,
        item_id: String,
        status: Status,
    },

    /// Get an item's view by ID.
    GetItem {
        caller: String,
        list_id: String,
        item_id: String,
    },

    /// Query a list's items.
    QueryItems {
        caller: String,
        list_id: String,
        #[serde(default)]
        query: ItemQuery,
    },

    /// Delete an item; the store's configured policy when `policy` is unset.
    DeleteItem {
        caller: String,
        list_id: String,
        item_id: String,
        #[serde(default)]
        policy: Option<DeletePolicy>,
    },

    /// Make `item_id` depend on `dependency_id`.
    AddDependency {
        caller: String,
        list_id: String,
        item_id: String,
        dependency_id: String,
    },

    RemoveDependency {
        caller: String,
        list_id: String,
        item_id: String,
        dependency_id: String,
    },

    Dependencies {
        caller: String,
        list_id: String,
        item_id: String,
    },

    Dependents {
        caller: String,
        list_id: String,
        item_id: String,
    },

    /// Get ready items (incomplete, all dependencies complete).
    Ready { caller: String, list_id: String },

    /// Run the expiration sweep now.
    Sweep,

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if daemon is alive.
    Ping,
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    List { list: List },

    Lists { lists: Vec<List> },

    /// Single item response.
    Item { item: Item },

    /// Multiple items response.
    Items { items: Vec<Item> },

    View { view: ItemView },

    Views { views: Vec<ItemView> },

    /// Dependency or dependent listing.
    Refs { refs: Vec<DependencyRef> },

    /// Whether an idempotent edge operation changed anything.
    Changed { changed: bool },

    Removed { removal: Removal },

    Deleted { count: usize },

    Swept { report: SweepReport },

    /// Operation succeeded.
    Ok,

    /// Pong response to ping.
    Pong,

    /// Error response. `kind` is one of `not_found`, `unauthorized`,
    /// `invalid_operation`, `validation` or `internal`.
    Error { kind: String, message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Convert a failed operation, keeping its taxonomy when it has one.
    pub fn from_report(err: &eyre::Report) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(store_err) => Self::error(store_err.kind(), store_err.to_string()),
            None => Self::error("internal", format!("{:#}", err)),
        }
    }
}

/// Error reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Entity, InvalidOperation};

    #[test]
    fn test_request_serialization() {
        let req = Request::CreateItem {
            caller: "alice".to_string(),
            list_id: "ls-1".to_string(),
            item: NewItem::named("Test"),
        };

        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        if let Request::CreateItem { caller, item, .. } = parsed {
            assert_eq!(caller, "alice");
            assert_eq!(item.name, "Test");
        } else {
            panic!("Wrong request type");
        }
    }

    #[test]
    fn test_query_defaults_when_omitted() {
        let json = r#"{"type":"QueryItems","caller":"alice","list_id":"ls-1"}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        match parsed {
            Request::QueryItems { query, .. } => assert_eq!(query, ItemQuery::default()),
            other => panic!("Wrong request type: {:?}", other),
        }
    }

    #[test]
    fn test_error_response_keeps_kind() {
        let report = eyre::eyre!(StoreError::from(InvalidOperation::CircularDependency));
        match Response::from_report(&report) {
            Response::Error { kind, message } => {
                assert_eq!(kind, "invalid_operation");
                assert_eq!(message, "This would create a circular dependency.");
            }
            other => panic!("Wrong response: {:?}", other),
        }

        let report = eyre::eyre!(StoreError::not_found(Entity::Item, "it-x"));
        assert!(matches!(Response::from_report(&report), Response::Error { kind, .. } if kind == "not_found"));

        let report = eyre::eyre!("disk full");
        assert!(matches!(Response::from_report(&report), Response::Error { kind, .. } if kind == "internal"));
    }
}
