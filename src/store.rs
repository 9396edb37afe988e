//! High-level store API for todograph.
//!
//! Every operation takes the caller's identity explicitly, resolves the list
//! and checks ownership before anything else, then loads that list's
//! [`ListGraph`], runs the mutation against it and appends the resulting
//! records. The graph is rebuilt per operation, so a rejected mutation never
//! reaches disk.

use crate::config::{Config, DeletePolicy};
use crate::error::{Entity, InvalidOperation, StoreError};
use crate::graph::{ListGraph, Removal, with_status};
use crate::id;
use crate::lock::StoreLock;
use crate::storage::{Storage, Tombstone, TombstoneKind};
use crate::sweep::{self, SweepReport, is_expired};
use crate::types::{Edge, Item, List, Status};
use crate::view::{DependencyRef, ItemView};
use chrono::{NaiveDate, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Fields for a new item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    /// Initial status; NOT_STARTED when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl NewItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update of an item. `None` leaves a field alone; for the nullable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

/// Distinguish an explicit `null` from a missing field.
fn double_option<'de, T, D>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Log a rejected operation and wrap it for the caller.
fn reject(err: StoreError) -> eyre::Report {
    log::debug!("Rejected: {}", err);
    eyre::eyre!(err)
}

/// The main todograph store.
pub struct Store {
    storage: Storage,
    config: Config,
}

impl Store {
    /// Initialize a new store in the given directory, writing a default
    /// config file if none exists.
    pub fn init(root: &Path) -> Result<Self> {
        let storage = Storage::init(root)?;
        let config_path = Config::path(storage.dir());
        if !config_path.exists() {
            Config::default().save(storage.dir())?;
        }
        let config = Config::load(storage.dir())?;
        Ok(Self { storage, config })
    }

    /// Open an existing store.
    pub fn open(root: &Path) -> Result<Self> {
        let storage = Storage::open(root)?;
        let config = Config::load(storage.dir())?;
        Ok(Self { storage, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the in-memory config (not persisted).
    pub fn set_config(&mut self, config: Config) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Hold the store-wide write lock until the guard drops.
    fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(self.storage.dir())
    }

    /// Resolve a list for `caller`: NotFound if absent, Unauthorized if owned
    /// by someone else.
    fn authorize(&self, caller: &str, list_id: &str) -> Result<List> {
        let list = self
            .storage
            .get_list(list_id)?
            .ok_or_else(|| reject(StoreError::not_found(Entity::List, list_id)))?;

        if list.owner != caller {
            return Err(reject(StoreError::Unauthorized {
                list_id: list_id.to_string(),
                caller: caller.to_string(),
            }));
        }

        Ok(list)
    }

    /// Load the dependency graph of a list the caller owns.
    pub fn graph(&self, caller: &str, list_id: &str) -> Result<ListGraph> {
        self.authorize(caller, list_id)?;
        self.load_graph(list_id)
    }

    fn load_graph(&self, list_id: &str) -> Result<ListGraph> {
        let items = self.storage.items_in_list(list_id)?;
        let edges = self.storage.edges_in_list(list_id)?;
        Ok(ListGraph::load(list_id, items, edges))
    }

    /// Fail unless `item_id` is an item of the loaded list.
    fn require_item<'g>(graph: &'g ListGraph, item_id: &str) -> Result<&'g Item> {
        graph
            .item(item_id)
            .ok_or_else(|| reject(StoreError::not_found(Entity::Item, item_id)))
    }

    // ---- lists ----

    /// Create a list owned by `owner`.
    pub fn create_list(&mut self, owner: &str, name: &str) -> Result<List> {
        let _lock = self.lock()?;
        let now = Utc::now();
        let name = name.trim();
        let list = List {
            id: id::list_id(name, now),
            name: name.to_string(),
            owner: owner.to_string(),
            created_at: now,
        };

        list.validate().map_err(|e| reject(e.into()))?;
        self.storage.append_list(&list).context("Failed to persist list")?;

        log::info!("Created list {} for {}", list.id, owner);
        Ok(list)
    }

    /// Lists owned by `owner`.
    pub fn lists(&self, owner: &str) -> Result<Vec<List>> {
        self.storage.lists_for_owner(owner)
    }

    pub fn get_list(&self, caller: &str, list_id: &str) -> Result<List> {
        self.authorize(caller, list_id)
    }

    pub fn rename_list(&mut self, caller: &str, list_id: &str, name: &str) -> Result<List> {
        let _lock = self.lock()?;
        let existing = self.authorize(caller, list_id)?;
        let renamed = List {
            name: name.trim().to_string(),
            ..existing
        };

        renamed.validate().map_err(|e| reject(e.into()))?;
        self.storage
            .append_list(&renamed)
            .context("Failed to persist renamed list")?;

        Ok(renamed)
    }

    /// Delete a list together with all of its items and edges. Returns the
    /// number of items removed.
    pub fn delete_list(&mut self, caller: &str, list_id: &str) -> Result<usize> {
        let _lock = self.lock()?;
        self.authorize(caller, list_id)?;
        let graph = self.load_graph(list_id)?;
        let now = Utc::now();

        for (from_id, to_id) in graph.edges() {
            self.storage
                .append_edge(&Edge {
                    list_id: list_id.to_string(),
                    from_id,
                    to_id,
                    created_at: now,
                    deleted: true,
                })
                .context("Failed to persist edge removal")?;
        }

        for item in graph.items() {
            self.storage
                .append_tombstone(&Tombstone {
                    kind: TombstoneKind::Item,
                    id: item.id.clone(),
                    deleted_at: now,
                })
                .context("Failed to persist item deletion")?;
        }

        self.storage
            .append_tombstone(&Tombstone {
                kind: TombstoneKind::List,
                id: list_id.to_string(),
                deleted_at: now,
            })
            .context("Failed to persist list deletion")?;

        log::info!("Deleted list {} ({} items)", list_id, graph.len());
        Ok(graph.len())
    }

    // ---- items ----

    /// Create an item in a list.
    pub fn create_item(&mut self, caller: &str, list_id: &str, new: NewItem) -> Result<Item> {
        let _lock = self.lock()?;
        self.authorize(caller, list_id)?;

        let status = new.status.unwrap_or(Status::NotStarted);
        if status == Status::Expired {
            return Err(reject(InvalidOperation::ExpiredNotRequestable.into()));
        }

        let now = Utc::now();
        let name = new.name.trim().to_string();
        let item = Item {
            id: id::item_id(&name, now),
            list_id: list_id.to_string(),
            name,
            description: new.description,
            status,
            deadline: new.deadline,
            created_at: now,
            updated_at: now,
            completed_at: (status == Status::Completed).then_some(now),
        };

        // Validate before persisting
        item.validate().map_err(|e| reject(e.into()))?;
        self.storage.append_item(&item).context("Failed to persist item")?;

        Ok(item)
    }

    /// Apply a partial update. A status change goes through the same rules
    /// as [`Store::set_status`]. An item left in EXPIRED is reset when it is
    /// no longer overdue on `today`.
    pub fn update_item(
        &mut self,
        caller: &str,
        list_id: &str,
        item_id: &str,
        update: ItemUpdate,
        today: NaiveDate,
    ) -> Result<Item> {
        let _lock = self.lock()?;
        self.authorize(caller, list_id)?;
        let graph = self.load_graph(list_id)?;
        let existing = Self::require_item(&graph, item_id)?;

        let now = Utc::now();
        let edited = Item {
            name: update
                .name
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| existing.name.clone()),
            description: match update.description {
                Some(d) => d,
                None => existing.description.clone(),
            },
            deadline: match update.deadline {
                Some(d) => d,
                None => existing.deadline,
            },
            ..existing.clone()
        };

        let mut target = update.status.unwrap_or(existing.status);
        if target != existing.status {
            graph.check_transition(item_id, target).map_err(reject)?;
        }
        // An item left in EXPIRED that is no longer overdue starts over.
        if target == Status::Expired && !is_expired(&edited, today) {
            target = Status::NotStarted;
        }

        let updated = with_status(&edited, target, now);

        // Validate before persisting
        updated.validate().map_err(|e| reject(e.into()))?;
        self.storage
            .append_item(&updated)
            .context("Failed to persist updated item")?;

        Ok(updated)
    }

    /// Request a status transition.
    pub fn set_status(&mut self, caller: &str, list_id: &str, item_id: &str, status: Status) -> Result<Item> {
        let _lock = self.lock()?;
        self.authorize(caller, list_id)?;
        let mut graph = self.load_graph(list_id)?;
        Self::require_item(&graph, item_id)?;

        let updated = graph.set_status(item_id, status, Utc::now()).map_err(reject)?;
        self.storage
            .append_item(&updated)
            .context("Failed to persist status change")?;

        Ok(updated)
    }

    /// Move an item to IN_PROGRESS.
    pub fn start(&mut self, caller: &str, list_id: &str, item_id: &str) -> Result<Item> {
        self.set_status(caller, list_id, item_id, Status::InProgress)
    }

    /// Mark an item COMPLETED.
    pub fn complete(&mut self, caller: &str, list_id: &str, item_id: &str) -> Result<Item> {
        self.set_status(caller, list_id, item_id, Status::Completed)
    }

    /// Read projection of one item.
    pub fn get_item(&self, caller: &str, list_id: &str, item_id: &str, today: NaiveDate) -> Result<ItemView> {
        let graph = self.graph(caller, list_id)?;
        graph.view(item_id, today).map_err(reject)
    }

    /// Read projections of every item in a list, oldest first.
    pub fn list_views(&self, caller: &str, list_id: &str, today: NaiveDate) -> Result<Vec<ItemView>> {
        let graph = self.graph(caller, list_id)?;
        let mut views = graph.views(today);
        views.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(views)
    }

    /// Delete an item using the configured policy.
    pub fn delete_item(&mut self, caller: &str, list_id: &str, item_id: &str) -> Result<Removal> {
        let policy = self.config.delete_policy;
        self.delete_item_with_policy(caller, list_id, item_id, policy)
    }

    /// Delete an item, unlinking (cascade) or refusing (strict) when other
    /// items depend on it.
    pub fn delete_item_with_policy(
        &mut self,
        caller: &str,
        list_id: &str,
        item_id: &str,
        policy: DeletePolicy,
    ) -> Result<Removal> {
        let _lock = self.lock()?;
        self.authorize(caller, list_id)?;
        let mut graph = self.load_graph(list_id)?;
        let removal = graph.remove_item(item_id, policy).map_err(reject)?;

        let now = Utc::now();
        for (from_id, to_id) in &removal.unlinked {
            self.storage
                .append_edge(&Edge {
                    list_id: list_id.to_string(),
                    from_id: from_id.clone(),
                    to_id: to_id.clone(),
                    created_at: now,
                    deleted: true,
                })
                .context("Failed to persist edge removal")?;
        }

        self.storage
            .append_tombstone(&Tombstone {
                kind: TombstoneKind::Item,
                id: item_id.to_string(),
                deleted_at: now,
            })
            .context("Failed to persist item deletion")?;

        if !removal.unlinked.is_empty() {
            log::info!("Deleted item {} and unlinked {} edges", item_id, removal.unlinked.len());
        }
        Ok(removal)
    }

    // ---- dependencies ----

    /// Make `item_id` depend on `dependency_id`. Returns whether a new edge
    /// was recorded (`false` when it already existed).
    pub fn add_dependency(&mut self, caller: &str, list_id: &str, item_id: &str, dependency_id: &str) -> Result<bool> {
        let _lock = self.lock()?;
        self.authorize(caller, list_id)?;
        let mut graph = self.load_graph(list_id)?;

        if item_id != dependency_id && graph.item(dependency_id).is_none() {
            // Distinguish an item of another list from one that does not exist.
            return match self.storage.get_item(dependency_id)? {
                Some(_) => Err(reject(
                    InvalidOperation::CrossList {
                        item_id: item_id.to_string(),
                        other_id: dependency_id.to_string(),
                    }
                    .into(),
                )),
                None => Err(reject(StoreError::not_found(Entity::Dependency, dependency_id))),
            };
        }

        let added = graph
            .add_dependency(item_id, dependency_id, self.config.max_dependency_depth)
            .map_err(reject)?;

        if added {
            self.storage
                .append_edge(&Edge {
                    list_id: list_id.to_string(),
                    from_id: item_id.to_string(),
                    to_id: dependency_id.to_string(),
                    created_at: Utc::now(),
                    deleted: false,
                })
                .context("Failed to persist edge")?;
        }

        Ok(added)
    }

    /// Drop the edge `item_id -> dependency_id`. Returns whether it existed.
    pub fn remove_dependency(
        &mut self,
        caller: &str,
        list_id: &str,
        item_id: &str,
        dependency_id: &str,
    ) -> Result<bool> {
        let _lock = self.lock()?;
        self.authorize(caller, list_id)?;
        let mut graph = self.load_graph(list_id)?;
        Self::require_item(&graph, item_id)?;
        if graph.item(dependency_id).is_none() {
            return Err(reject(StoreError::not_found(Entity::Dependency, dependency_id)));
        }

        let removed = graph.remove_dependency(item_id, dependency_id);
        if removed {
            self.storage
                .append_edge(&Edge {
                    list_id: list_id.to_string(),
                    from_id: item_id.to_string(),
                    to_id: dependency_id.to_string(),
                    created_at: Utc::now(),
                    deleted: true,
                })
                .context("Failed to persist edge removal")?;
        }

        Ok(removed)
    }

    /// Items `item_id` waits on.
    pub fn dependencies(&self, caller: &str, list_id: &str, item_id: &str) -> Result<Vec<DependencyRef>> {
        let graph = self.graph(caller, list_id)?;
        graph.dependency_refs(item_id).map_err(reject)
    }

    /// Items waiting on `item_id`.
    pub fn dependents(&self, caller: &str, list_id: &str, item_id: &str) -> Result<Vec<DependencyRef>> {
        let graph = self.graph(caller, list_id)?;
        graph.dependent_refs(item_id).map_err(reject)
    }

    /// Items that are not completed and whose dependencies all are.
    pub fn ready(&self, caller: &str, list_id: &str) -> Result<Vec<Item>> {
        let graph = self.graph(caller, list_id)?;
        let mut ready: Vec<Item> = graph.ready().into_iter().cloned().collect();
        ready.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(ready)
    }

    // ---- expiration ----

    /// Move every overdue, incomplete item (across all lists) to EXPIRED.
    ///
    /// A write failure on one item is recorded in the report and does not
    /// stop the pass; that item is picked up again next time.
    pub fn sweep_expired(&mut self, today: NaiveDate) -> Result<SweepReport> {
        let _lock = self.lock()?;
        let now = Utc::now();
        let items = self.storage.all_items().context("Failed to load items for sweep")?;
        let stale = sweep::sweep_expired(&items, today, now);

        let mut report = SweepReport {
            today: Some(today),
            checked: items.len(),
            ..SweepReport::default()
        };

        for item in stale {
            match self.storage.append_item(&item) {
                Ok(()) => report.expired.push(item.id),
                Err(e) => {
                    log::warn!("Failed to expire item {}: {:#}", item.id, e);
                    report.errors.push((item.id, format!("{:#}", e)));
                }
            }
        }

        log::info!(
            "Sweep for {}: checked {}, expired {}, failed {}",
            today,
            report.checked,
            report.expired.len(),
            report.errors.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OWNER: &str = "alice";

    fn setup_test_store() -> (TempDir, Store, String) {
        let temp_dir = TempDir::new().unwrap();
        let mut store = Store::init(temp_dir.path()).unwrap();
        let list = store.create_list(OWNER, "Chores").unwrap();
        (temp_dir, store, list.id)
    }

    fn store_error(err: &eyre::Report) -> &StoreError {
        err.downcast_ref::<StoreError>().expect("expected a StoreError")
    }

    #[test]
    fn test_init_writes_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path()).unwrap();
        assert!(Config::path(&temp_dir.path().join(".todograph")).exists());
        assert_eq!(store.config(), &Config::default());
    }

    #[test]
    fn test_create_and_get() {
        let (_temp_dir, mut store, list) = setup_test_store();

        let item = store
            .create_item(
                OWNER,
                &list,
                NewItem {
                    description: Some("Before the weekend".to_string()),
                    ..NewItem::named("  Buy milk  ")
                },
            )
            .unwrap();

        assert!(item.id.starts_with("it-"));
        assert_eq!(item.name, "Buy milk");
        assert_eq!(item.status, Status::NotStarted);

        let view = store.get_item(OWNER, &list, &item.id, Utc::now().date_naive()).unwrap();
        assert_eq!(view.name, "Buy milk");
        assert!(view.can_be_completed);
        assert!(view.dependencies.is_empty());
    }

    #[test]
    fn test_create_rejects_expired_status() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let err = store
            .create_item(
                OWNER,
                &list,
                NewItem {
                    status: Some(Status::Expired),
                    ..NewItem::named("Late")
                },
            )
            .unwrap_err();
        assert_eq!(store_error(&err), &StoreError::from(InvalidOperation::ExpiredNotRequestable));
    }

    #[test]
    fn test_create_completed_sets_completed_at() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let item = store
            .create_item(
                OWNER,
                &list,
                NewItem {
                    status: Some(Status::Completed),
                    ..NewItem::named("Already done")
                },
            )
            .unwrap();
        assert!(item.completed_at.is_some());
    }

    #[test]
    fn test_other_owner_is_unauthorized() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let err = store.create_item("mallory", &list, NewItem::named("Sneaky")).unwrap_err();
        assert!(matches!(store_error(&err), StoreError::Unauthorized { .. }));
    }

    #[test]
    fn test_update_partial_fields() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let item = store
            .create_item(
                OWNER,
                &list,
                NewItem {
                    description: Some("old".to_string()),
                    ..NewItem::named("Original")
                },
            )
            .unwrap();

        let updated = store
            .update_item(
                OWNER,
                &list,
                &item.id,
                ItemUpdate {
                    name: Some("Renamed".to_string()),
                    description: Some(None),
                    ..ItemUpdate::default()
                },
                Utc::now().date_naive(),
            )
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.description, None);
        assert_eq!(updated.status, Status::NotStarted);
        assert_eq!(updated.created_at, item.created_at);
    }

    #[test]
    fn test_ready_with_dependency() {
        let (_temp_dir, mut store, list) = setup_test_store();

        let blocker = store.create_item(OWNER, &list, NewItem::named("Blocker")).unwrap();
        let blocked = store.create_item(OWNER, &list, NewItem::named("Blocked")).unwrap();
        assert!(store.add_dependency(OWNER, &list, &blocked.id, &blocker.id).unwrap());

        let ready = store.ready(OWNER, &list).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, blocker.id);

        store.complete(OWNER, &list, &blocker.id).unwrap();

        let ready = store.ready(OWNER, &list).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, blocked.id);
    }

    #[test]
    fn test_edge_idempotent() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let a = store.create_item(OWNER, &list, NewItem::named("A")).unwrap();
        let b = store.create_item(OWNER, &list, NewItem::named("B")).unwrap();

        assert!(store.add_dependency(OWNER, &list, &a.id, &b.id).unwrap());
        assert!(!store.add_dependency(OWNER, &list, &a.id, &b.id).unwrap());
        assert_eq!(store.dependencies(OWNER, &list, &a.id).unwrap().len(), 1);

        assert!(store.remove_dependency(OWNER, &list, &a.id, &b.id).unwrap());
        assert!(!store.remove_dependency(OWNER, &list, &a.id, &b.id).unwrap());
    }

    #[test]
    fn test_cross_list_dependency_rejected() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let other = store.create_list(OWNER, "Errands").unwrap();
        let a = store.create_item(OWNER, &list, NewItem::named("A")).unwrap();
        let b = store.create_item(OWNER, &other.id, NewItem::named("B")).unwrap();

        let err = store.add_dependency(OWNER, &list, &a.id, &b.id).unwrap_err();
        assert!(matches!(
            store_error(&err),
            StoreError::InvalidOperation(InvalidOperation::CrossList { .. })
        ));
    }

    #[test]
    fn test_sweep_persists_expiry() {
        let (temp_dir, mut store, list) = setup_test_store();
        let item = store
            .create_item(
                OWNER,
                &list,
                NewItem {
                    deadline: NaiveDate::from_ymd_opt(2024, 1, 1),
                    ..NewItem::named("Renew passport")
                },
            )
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let report = store.sweep_expired(today).unwrap();
        assert_eq!(report.expired, vec![item.id.clone()]);
        assert!(report.is_clean());

        let reopened = Store::open(temp_dir.path()).unwrap();
        let view = reopened.get_item(OWNER, &list, &item.id, today).unwrap();
        assert_eq!(view.status, Status::Expired);
        assert!(view.expired);
    }

    #[test]
    fn test_delete_list_removes_items() {
        let (_temp_dir, mut store, list) = setup_test_store();
        let a = store.create_item(OWNER, &list, NewItem::named("A")).unwrap();
        let b = store.create_item(OWNER, &list, NewItem::named("B")).unwrap();
        store.add_dependency(OWNER, &list, &a.id, &b.id).unwrap();

        assert_eq!(store.delete_list(OWNER, &list).unwrap(), 2);

        let err = store.get_list(OWNER, &list).unwrap_err();
        assert!(matches!(store_error(&err), StoreError::NotFound { entity: Entity::List, .. }));
        assert!(store.lists(OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_item_update_null_description_deserializes_as_clear() {
        let update: ItemUpdate = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(update.description, Some(None));

        let update: ItemUpdate = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(update.description, None);
    }
}
