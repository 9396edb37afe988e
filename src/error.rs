//! Error taxonomy shared by the engine, the store and the daemon.

use crate::types::ValidationError;
use thiserror::Error;

/// The kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    List,
    Item,
    Dependency,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::List => f.write_str("list"),
            Entity::Item => f.write_str("item"),
            Entity::Dependency => f.write_str("dependency item"),
        }
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// List, item or dependency does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The list exists but belongs to someone else.
    #[error("list {list_id} is not owned by {caller}")]
    Unauthorized { list_id: String, caller: String },

    /// A graph or completion rule rejected the operation.
    #[error(transparent)]
    InvalidOperation(#[from] InvalidOperation),

    /// Field validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        StoreError::NotFound { entity, id: id.into() }
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::Unauthorized { .. } => "unauthorized",
            StoreError::InvalidOperation(_) => "invalid_operation",
            StoreError::Validation(_) => "validation",
        }
    }
}

/// Reasons an otherwise well-formed request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidOperation {
    #[error("Item cannot depend on itself.")]
    SelfDependency,

    #[error("This would create a circular dependency.")]
    CircularDependency,

    #[error("Dependency chain too deep or possible circular dependency (max depth {max_depth}).")]
    DependencyChainTooDeep { max_depth: usize },

    #[error("Items {item_id} and {other_id} belong to different lists.")]
    CrossList { item_id: String, other_id: String },

    #[error("Cannot mark as COMPLETED! Dependencies are not complete.")]
    DependenciesIncomplete,

    #[error("Cannot change status! There are items depending on this that are COMPLETED.")]
    CompletedDependents,

    #[error("A COMPLETED item cannot gain a dependency that is not COMPLETED.")]
    IncompleteDependencyOnCompletedItem,

    #[error("EXPIRED is assigned by the expiration sweep and cannot be requested.")]
    ExpiredNotRequestable,

    #[error("Item {item_id} already exists in this list.")]
    DuplicateItem { item_id: String },

    #[error("Cannot delete: {count} other item(s) depend on this item. Remove dependencies first.")]
    HasDependents { count: usize },
}
