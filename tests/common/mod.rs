//! Shared test infrastructure for todograph integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use chrono::NaiveDate;
use todograph::{Item, ItemUpdate, NewItem, Status, Store, StoreError};
use tempfile::TempDir;

/// Default owner for the test list.
pub const OWNER: &str = "alice";

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: Store,
    /// A list owned by [`OWNER`].
    pub list: String,
}

impl TestEnv {
    /// Create a new test environment with an initialized store and one list.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = Store::init(temp_dir.path()).expect("Failed to init store");
        let list = store.create_list(OWNER, "Test list").expect("Failed to create list").id;
        Self { temp_dir, store, list }
    }

    /// Reopen the store from disk, dropping the in-memory handle.
    pub fn reopen(&mut self) {
        self.store = Store::open(self.temp_dir.path()).expect("Failed to reopen store");
    }

    /// Create an item with just a name.
    pub fn create_item(&mut self, name: &str) -> Item {
        self.store
            .create_item(OWNER, &self.list, NewItem::named(name))
            .expect("Failed to create item")
    }

    /// Create an item with a deadline.
    pub fn create_item_due(&mut self, name: &str, deadline: NaiveDate) -> Item {
        self.store
            .create_item(
                OWNER,
                &self.list,
                NewItem {
                    deadline: Some(deadline),
                    ..NewItem::named(name)
                },
            )
            .expect("Failed to create item")
    }

    /// Make `item` depend on `dependency`.
    pub fn depend(&mut self, item: &Item, dependency: &Item) {
        self.store
            .add_dependency(OWNER, &self.list, &item.id, &dependency.id)
            .expect("Failed to add dependency");
    }

    /// Try to make `item` depend on `dependency`.
    pub fn try_depend(&mut self, item: &Item, dependency: &Item) -> eyre::Result<bool> {
        self.store.add_dependency(OWNER, &self.list, &item.id, &dependency.id)
    }

    /// Mark an item completed.
    pub fn complete(&mut self, item: &Item) -> Item {
        self.store
            .complete(OWNER, &self.list, &item.id)
            .expect("Failed to complete item")
    }

    pub fn try_set_status(&mut self, item: &Item, status: Status) -> eyre::Result<Item> {
        self.store.set_status(OWNER, &self.list, &item.id, status)
    }

    pub fn update(&mut self, item: &Item, update: ItemUpdate) -> eyre::Result<Item> {
        self.update_on(item, update, todograph::sweep::today())
    }

    /// Update with a pinned calendar date.
    pub fn update_on(&mut self, item: &Item, update: ItemUpdate, today: NaiveDate) -> eyre::Result<Item> {
        self.store.update_item(OWNER, &self.list, &item.id, update, today)
    }

    /// Current persisted status of an item.
    pub fn status_of(&self, item: &Item) -> Status {
        self.store
            .graph(OWNER, &self.list)
            .expect("Failed to load graph")
            .item(&item.id)
            .expect("Item missing")
            .status
    }

    /// Ids the item currently depends on.
    pub fn dependency_ids(&self, item: &Item) -> Vec<String> {
        self.store
            .dependencies(OWNER, &self.list, &item.id)
            .expect("Failed to list dependencies")
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    /// Ids of items depending on this one.
    pub fn dependent_ids(&self, item: &Item) -> Vec<String> {
        self.store
            .dependents(OWNER, &self.list, &item.id)
            .expect("Failed to list dependents")
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    /// Assert that an item is in the ready list.
    pub fn assert_ready(&self, item: &Item) {
        let ready = self.store.ready(OWNER, &self.list).expect("Failed to get ready items");
        assert!(
            ready.iter().any(|i| i.id == item.id),
            "Expected item {} to be ready, but it wasn't. Ready items: {:?}",
            item.id,
            ready.iter().map(|i| &i.id).collect::<Vec<_>>()
        );
    }

    /// Assert that an item is NOT in the ready list.
    pub fn assert_not_ready(&self, item: &Item) {
        let ready = self.store.ready(OWNER, &self.list).expect("Failed to get ready items");
        assert!(
            !ready.iter().any(|i| i.id == item.id),
            "Expected item {} to NOT be ready, but it was",
            item.id
        );
    }

    /// Assert the stored graph of the test list is acyclic and mirrored.
    pub fn assert_graph_consistent(&self) {
        let graph = self.store.graph(OWNER, &self.list).expect("Failed to load graph");
        assert!(graph.is_acyclic(), "graph has a cycle: {:?}", graph.edges());
        assert!(graph.is_symmetric(), "dependencies and dependents disagree");
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Recover the domain error from a store failure.
pub fn store_error(err: &eyre::Report) -> &StoreError {
    err.downcast_ref::<StoreError>()
        .unwrap_or_else(|| panic!("expected a StoreError, got: {:#}", err))
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
