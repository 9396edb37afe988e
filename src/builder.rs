//! Builder pattern API for creating items.

use crate::store::{NewItem, Store};
use crate::types::{Item, Status};
use chrono::NaiveDate;
use eyre::{Context, Result};

/// Builder for creating items with a fluent API.
///
/// # Example
///
/// ```ignore
/// let item = store.build("alice", &list.id, "File taxes")
///     .description("Federal and state")
///     .deadline(NaiveDate::from_ymd_opt(2026, 4, 15).unwrap())
///     .create()?;
/// ```
pub struct ItemBuilder<'a> {
    store: &'a mut Store,
    caller: String,
    list_id: String,
    item: NewItem,
}

impl<'a> ItemBuilder<'a> {
    /// Create a new builder for an item named `name` in `list_id`.
    pub fn new(
        store: &'a mut Store,
        caller: impl Into<String>,
        list_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            caller: caller.into(),
            list_id: list_id.into(),
            item: NewItem::named(name),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.item.description = Some(description.into());
        self
    }

    pub fn deadline(mut self, deadline: NaiveDate) -> Self {
        self.item.deadline = Some(deadline);
        self
    }

    /// Set the initial status.
    pub fn status(mut self, status: Status) -> Self {
        self.item.status = Some(status);
        self
    }

    /// Create the item.
    pub fn create(self) -> Result<Item> {
        self.store
            .create_item(&self.caller, &self.list_id, self.item)
            .context("Failed to create item")
    }
}

/// Extension trait to add builder method to Store.
pub trait StoreBuilderExt {
    /// Start building a new item with the given name.
    fn build(&mut self, caller: &str, list_id: &str, name: impl Into<String>) -> ItemBuilder<'_>;
}

impl StoreBuilderExt for Store {
    fn build(&mut self, caller: &str, list_id: &str, name: impl Into<String>) -> ItemBuilder<'_> {
        ItemBuilder::new(self, caller, list_id, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use tempfile::TempDir;

    fn setup_test_store() -> (TempDir, Store, String) {
        let temp_dir = TempDir::new().unwrap();
        let mut store = Store::init(temp_dir.path()).unwrap();
        let list = store.create_list("alice", "Home").unwrap();
        (temp_dir, store, list.id)
    }

    #[test]
    fn test_builder_basic() {
        let (_temp_dir, mut store, list) = setup_test_store();

        let item = store.build("alice", &list, "Water plants").create().unwrap();

        assert_eq!(item.name, "Water plants");
        assert_eq!(item.status, Status::NotStarted);
        assert!(item.description.is_none());
        assert!(item.deadline.is_none());
    }

    #[test]
    fn test_builder_with_all_fields() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let deadline = NaiveDate::from_ymd_opt(2030, 4, 15).unwrap();

        let item = store
            .build("alice", &list, "File taxes")
            .description("Federal and state")
            .deadline(deadline)
            .status(Status::InProgress)
            .create()
            .unwrap();

        assert_eq!(item.description.as_deref(), Some("Federal and state"));
        assert_eq!(item.deadline, Some(deadline));
        assert_eq!(item.status, Status::InProgress);
    }

    #[test]
    fn test_builder_validation_error_keeps_kind() {
        let (_temp_dir, mut store, list) = setup_test_store();

        let err = store.build("alice", &list, "   ").create().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation(_))
        ));
    }
}
