//! Per-list dependency graph and completion rules.
//!
//! A [`ListGraph`] is an in-memory view of one list: its items plus two
//! adjacency maps, `dependencies` (item -> items it waits on) and
//! `dependents` (the mirror). Every mutation updates both maps together and
//! validates all of its preconditions before touching either, so a failed
//! call leaves the graph exactly as it was.

use crate::config::DeletePolicy;
use crate::error::{Entity, InvalidOperation, StoreError};
use crate::types::{Edge, Item, Status};
use crate::view::{DependencyRef, ItemView};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Result of removing an item from the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Removal {
    /// The item that was removed.
    pub item: Item,
    /// Every edge (from_id, to_id) that was unlinked along with it.
    pub unlinked: Vec<(String, String)>,
}

/// Dependency graph of a single list.
#[derive(Debug, Clone, Default)]
pub struct ListGraph {
    list_id: String,
    items: BTreeMap<String, Item>,
    dependencies: HashMap<String, BTreeSet<String>>,
    dependents: HashMap<String, BTreeSet<String>>,
}

impl ListGraph {
    /// Create an empty graph for a list.
    pub fn new(list_id: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            ..Self::default()
        }
    }

    /// Build a graph from stored items and edges.
    ///
    /// Items from other lists and edges that would dangle, cross lists or
    /// loop onto themselves are dropped with a warning rather than loaded.
    pub fn load(
        list_id: impl Into<String>,
        items: impl IntoIterator<Item = Item>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Self {
        let mut graph = Self::new(list_id);

        for item in items {
            if let Err(e) = graph.insert_item(item) {
                log::warn!("Skipping item while loading list {}: {}", graph.list_id, e);
            }
        }

        for edge in edges.into_iter().filter(|e| !e.deleted) {
            if edge.list_id != graph.list_id
                || edge.from_id == edge.to_id
                || !graph.items.contains_key(&edge.from_id)
                || !graph.items.contains_key(&edge.to_id)
            {
                log::warn!(
                    "Skipping edge {} -> {} while loading list {}",
                    edge.from_id,
                    edge.to_id,
                    graph.list_id
                );
                continue;
            }
            graph.link(&edge.from_id, &edge.to_id);
        }

        graph
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Items ordered by id.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Ids this item waits on.
    pub fn dependencies_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.dependencies.get(id).into_iter().flatten().map(String::as_str)
    }

    /// Ids of items waiting on this one.
    pub fn dependents_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.dependents.get(id).into_iter().flatten().map(String::as_str)
    }

    pub fn has_edge(&self, from_id: &str, to_id: &str) -> bool {
        self.dependencies.get(from_id).is_some_and(|deps| deps.contains(to_id))
    }

    /// All edges as (from_id, to_id), sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .dependencies
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.clone(), to.clone())))
            .collect();
        edges.sort();
        edges
    }

    /// Add a new item. It must belong to this list and not exist yet.
    pub fn insert_item(&mut self, item: Item) -> Result<(), StoreError> {
        if item.list_id != self.list_id {
            return Err(InvalidOperation::CrossList {
                item_id: item.id,
                other_id: self.list_id.clone(),
            }
            .into());
        }
        if self.items.contains_key(&item.id) {
            return Err(InvalidOperation::DuplicateItem { item_id: item.id }.into());
        }
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    /// Replace the stored copy of an existing item (field edits).
    ///
    /// Status is not checked here; use [`ListGraph::set_status`] for
    /// transitions.
    pub fn replace_item(&mut self, item: Item) -> Result<(), StoreError> {
        let slot = self
            .items
            .get_mut(&item.id)
            .ok_or_else(|| StoreError::not_found(Entity::Item, &item.id))?;
        if item.list_id != slot.list_id {
            return Err(InvalidOperation::CrossList {
                item_id: item.id,
                other_id: self.list_id.clone(),
            }
            .into());
        }
        *slot = item;
        Ok(())
    }

    fn require(&self, id: &str, entity: Entity) -> Result<&Item, StoreError> {
        self.items.get(id).ok_or_else(|| StoreError::not_found(entity, id))
    }

    fn link(&mut self, from_id: &str, to_id: &str) {
        self.dependencies
            .entry(from_id.to_string())
            .or_default()
            .insert(to_id.to_string());
        self.dependents
            .entry(to_id.to_string())
            .or_default()
            .insert(from_id.to_string());
    }

    fn unlink(&mut self, from_id: &str, to_id: &str) -> bool {
        let removed = detach(&mut self.dependencies, from_id, to_id);
        detach(&mut self.dependents, to_id, from_id);
        removed
    }

    /// Make `item_id` depend on `dependency_id`.
    ///
    /// Returns `Ok(true)` when a new edge was added and `Ok(false)` when it
    /// already existed.
    pub fn add_dependency(&mut self, item_id: &str, dependency_id: &str, max_depth: usize) -> Result<bool, StoreError> {
        if item_id == dependency_id {
            return Err(InvalidOperation::SelfDependency.into());
        }

        let item = self.require(item_id, Entity::Item)?;
        let dependency = self.require(dependency_id, Entity::Dependency)?;

        if item.list_id != dependency.list_id {
            return Err(InvalidOperation::CrossList {
                item_id: item_id.to_string(),
                other_id: dependency_id.to_string(),
            }
            .into());
        }

        if self.has_edge(item_id, dependency_id) {
            return Ok(false);
        }

        if item.status == Status::Completed && dependency.status != Status::Completed {
            return Err(InvalidOperation::IncompleteDependencyOnCompletedItem.into());
        }

        // The new edge closes a loop iff the dependency can already reach the item.
        if self.reaches(dependency_id, item_id, max_depth)? {
            return Err(InvalidOperation::CircularDependency.into());
        }

        self.link(item_id, dependency_id);
        Ok(true)
    }

    /// Drop the edge if present. Returns whether anything changed.
    pub fn remove_dependency(&mut self, item_id: &str, dependency_id: &str) -> bool {
        self.unlink(item_id, dependency_id)
    }

    /// Walk `dependencies` edges from `start` looking for `target`.
    ///
    /// Fails once the walk goes deeper than `max_depth` hops.
    fn reaches<'a>(&'a self, start: &'a str, target: &str, max_depth: usize) -> Result<bool, StoreError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];

        while let Some((node, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(InvalidOperation::DependencyChainTooDeep { max_depth }.into());
            }
            if node == target {
                return Ok(true);
            }
            if !visited.insert(node) {
                continue;
            }
            for next in self.dependencies_of(node) {
                if !visited.contains(next) {
                    stack.push((next, depth + 1));
                }
            }
        }

        Ok(false)
    }

    /// True iff every dependency of the item is COMPLETED (or it has none).
    pub fn can_be_completed(&self, item_id: &str) -> Result<bool, StoreError> {
        self.require(item_id, Entity::Item)?;
        Ok(self
            .dependencies_of(item_id)
            .all(|dep| self.items.get(dep).is_some_and(|d| d.status == Status::Completed)))
    }

    fn has_completed_dependent(&self, item_id: &str) -> bool {
        self.dependents_of(item_id)
            .any(|dep| self.items.get(dep).is_some_and(|d| d.status == Status::Completed))
    }

    /// Check whether a user may move the item to `target`.
    pub fn check_transition(&self, item_id: &str, target: Status) -> Result<(), StoreError> {
        let item = self.require(item_id, Entity::Item)?;

        if target == Status::Expired && item.status != Status::Expired {
            return Err(InvalidOperation::ExpiredNotRequestable.into());
        }

        if target == Status::Completed && !self.can_be_completed(item_id)? {
            return Err(InvalidOperation::DependenciesIncomplete.into());
        }

        if item.status == Status::Completed && target != Status::Completed && self.has_completed_dependent(item_id) {
            return Err(InvalidOperation::CompletedDependents.into());
        }

        Ok(())
    }

    /// Apply a user-requested status change and return the updated item.
    pub fn set_status(&mut self, item_id: &str, target: Status, now: DateTime<Utc>) -> Result<Item, StoreError> {
        self.check_transition(item_id, target)?;
        let item = self.require(item_id, Entity::Item)?;
        let updated = with_status(item, target, now);
        self.items.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    /// Remove an item, repairing or refusing according to `policy`.
    pub fn remove_item(&mut self, item_id: &str, policy: DeletePolicy) -> Result<Removal, StoreError> {
        self.require(item_id, Entity::Item)?;

        let dependents: Vec<String> = self.dependents_of(item_id).map(String::from).collect();
        if policy == DeletePolicy::Strict && !dependents.is_empty() {
            return Err(InvalidOperation::HasDependents {
                count: dependents.len(),
            }
            .into());
        }
        let dependencies: Vec<String> = self.dependencies_of(item_id).map(String::from).collect();

        let mut unlinked = Vec::with_capacity(dependents.len() + dependencies.len());
        for dependent in dependents {
            self.unlink(&dependent, item_id);
            unlinked.push((dependent, item_id.to_string()));
        }
        for dependency in dependencies {
            self.unlink(item_id, &dependency);
            unlinked.push((item_id.to_string(), dependency));
        }

        let item = self
            .items
            .remove(item_id)
            .ok_or_else(|| StoreError::not_found(Entity::Item, item_id))?;

        Ok(Removal { item, unlinked })
    }

    /// Dependencies of an item as id/name pairs.
    pub fn dependency_refs(&self, item_id: &str) -> Result<Vec<DependencyRef>, StoreError> {
        self.require(item_id, Entity::Item)?;
        Ok(self
            .dependencies_of(item_id)
            .filter_map(|id| self.items.get(id))
            .map(DependencyRef::of)
            .collect())
    }

    /// Dependents of an item as id/name pairs.
    pub fn dependent_refs(&self, item_id: &str) -> Result<Vec<DependencyRef>, StoreError> {
        self.require(item_id, Entity::Item)?;
        Ok(self
            .dependents_of(item_id)
            .filter_map(|id| self.items.get(id))
            .map(DependencyRef::of)
            .collect())
    }

    /// Read projection of one item.
    pub fn view(&self, item_id: &str, today: NaiveDate) -> Result<ItemView, StoreError> {
        let item = self.require(item_id, Entity::Item)?;
        let dependencies = self.dependency_refs(item_id)?;
        let completable = self.can_be_completed(item_id)?;
        Ok(ItemView::new(item, dependencies, completable, today))
    }

    /// Read projections of every item, ordered by id.
    pub fn views(&self, today: NaiveDate) -> Vec<ItemView> {
        self.items
            .keys()
            .filter_map(|id| self.view(id, today).ok())
            .collect()
    }

    /// Items not yet completed whose dependencies are all complete.
    pub fn ready(&self) -> Vec<&Item> {
        self.items
            .values()
            .filter(|item| item.status != Status::Completed)
            .filter(|item| self.can_be_completed(&item.id).unwrap_or(false))
            .collect()
    }

    /// True if the dependency edges contain no cycle.
    pub fn is_acyclic(&self) -> bool {
        // Kahn's algorithm: repeatedly strip items with no remaining dependencies.
        let mut remaining: HashMap<&str, usize> = self
            .items
            .keys()
            .map(|id| (id.as_str(), self.dependencies_of(id).count()))
            .collect();
        let mut queue: Vec<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut stripped = 0;

        while let Some(id) = queue.pop() {
            stripped += 1;
            for dependent in self.dependents_of(id) {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push(dependent);
                    }
                }
            }
        }

        stripped == self.items.len()
    }

    /// True if `dependents` is exactly the mirror of `dependencies`.
    pub fn is_symmetric(&self) -> bool {
        let forward = self
            .dependencies
            .iter()
            .all(|(from, tos)| tos.iter().all(|to| self.dependents.get(to).is_some_and(|s| s.contains(from))));
        let backward = self
            .dependents
            .iter()
            .all(|(to, froms)| froms.iter().all(|from| self.has_edge(from, to)));
        forward && backward
    }
}

/// Remove `value` from the set under `key`, dropping the set once empty.
fn detach(map: &mut HashMap<String, BTreeSet<String>>, key: &str, value: &str) -> bool {
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(key);
    }
    removed
}

/// Copy of `item` moved to `target`, keeping `completed_at` consistent.
///
/// Re-completing an already completed item keeps its original timestamp.
pub fn with_status(item: &Item, target: Status, now: DateTime<Utc>) -> Item {
    let completed_at = match target {
        Status::Completed => item.completed_at.or(Some(now)),
        _ => None,
    };
    Item {
        status: target,
        completed_at,
        updated_at: now,
        ..item.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "ls-test";

    fn item(id: &str) -> Item {
        let now = Utc::now();
        Item {
            id: id.to_string(),
            list_id: LIST.to_string(),
            name: format!("Item {}", id),
            description: None,
            status: Status::NotStarted,
            deadline: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn graph(ids: &[&str]) -> ListGraph {
        let mut g = ListGraph::new(LIST);
        for id in ids {
            g.insert_item(item(id)).unwrap();
        }
        g
    }

    fn complete(g: &mut ListGraph, id: &str) {
        g.set_status(id, Status::Completed, Utc::now()).unwrap();
    }

    #[test]
    fn test_add_dependency_links_both_sides() {
        let mut g = graph(&["a", "b"]);
        assert!(g.add_dependency("a", "b", 10).unwrap());

        assert!(g.has_edge("a", "b"));
        assert_eq!(g.dependencies_of("a").collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(g.dependents_of("b").collect::<Vec<_>>(), vec!["a"]);
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_add_dependency_is_idempotent() {
        let mut g = graph(&["a", "b"]);
        assert!(g.add_dependency("a", "b", 10).unwrap());
        assert!(!g.add_dependency("a", "b", 10).unwrap());
        assert_eq!(g.edges(), vec![("a".to_string(), "b".to_string())]);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut g = graph(&["a"]);
        let err = g.add_dependency("a", "a", 10).unwrap_err();
        assert_eq!(err, StoreError::InvalidOperation(InvalidOperation::SelfDependency));
    }

    #[test]
    fn test_missing_endpoints_are_not_found() {
        let mut g = graph(&["a"]);
        assert_eq!(
            g.add_dependency("a", "zz", 10).unwrap_err(),
            StoreError::not_found(Entity::Dependency, "zz")
        );
        assert_eq!(
            g.add_dependency("zz", "a", 10).unwrap_err(),
            StoreError::not_found(Entity::Item, "zz")
        );
    }

    #[test]
    fn test_direct_cycle_rejected_and_graph_unchanged() {
        let mut g = graph(&["x", "y"]);
        g.add_dependency("x", "y", 10).unwrap();

        let err = g.add_dependency("y", "x", 10).unwrap_err();
        assert_eq!(err, StoreError::InvalidOperation(InvalidOperation::CircularDependency));
        assert_eq!(g.edges(), vec![("x".to_string(), "y".to_string())]);
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let mut g = graph(&["a", "b", "c"]);
        g.add_dependency("a", "b", 10).unwrap();
        g.add_dependency("b", "c", 10).unwrap();

        let err = g.add_dependency("c", "a", 10).unwrap_err();
        assert_eq!(err, StoreError::InvalidOperation(InvalidOperation::CircularDependency));
        assert!(g.is_acyclic());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut g = graph(&["top", "left", "right", "bottom"]);
        g.add_dependency("top", "left", 10).unwrap();
        g.add_dependency("top", "right", 10).unwrap();
        g.add_dependency("left", "bottom", 10).unwrap();
        g.add_dependency("right", "bottom", 10).unwrap();
        assert!(g.is_acyclic());
        assert_eq!(g.edges().len(), 4);
    }

    #[test]
    fn test_depth_bound_enforced() {
        // a0 -> a1 -> a2 -> a3 -> a4, built from the far end.
        let mut g = graph(&["a0", "a1", "a2", "a3", "a4", "z"]);
        for i in (0..4).rev() {
            g.add_dependency(&format!("a{}", i), &format!("a{}", i + 1), 3).unwrap();
        }

        let err = g.add_dependency("z", "a0", 3).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidOperation(InvalidOperation::DependencyChainTooDeep { max_depth: 3 })
        );
        assert!(!g.has_edge("z", "a0"));

        // A larger bound accepts the same edge.
        assert!(g.add_dependency("z", "a0", 4).unwrap());
    }

    #[test]
    fn test_remove_dependency() {
        let mut g = graph(&["a", "b"]);
        g.add_dependency("a", "b", 10).unwrap();

        assert!(g.remove_dependency("a", "b"));
        assert!(!g.has_edge("a", "b"));
        assert_eq!(g.dependents_of("b").count(), 0);
        assert!(g.is_symmetric());

        // Absent edge is a no-op.
        assert!(!g.remove_dependency("a", "b"));
        assert!(!g.remove_dependency("b", "a"));
    }

    #[test]
    fn test_can_be_completed() {
        let mut g = graph(&["a", "b", "c"]);
        assert!(g.can_be_completed("a").unwrap());

        g.add_dependency("a", "b", 10).unwrap();
        g.add_dependency("a", "c", 10).unwrap();
        assert!(!g.can_be_completed("a").unwrap());

        complete(&mut g, "b");
        assert!(!g.can_be_completed("a").unwrap());

        complete(&mut g, "c");
        assert!(g.can_be_completed("a").unwrap());
    }

    #[test]
    fn test_complete_sets_completed_at_once() {
        let mut g = graph(&["a"]);
        let first = g.set_status("a", Status::Completed, Utc::now()).unwrap();
        let stamp = first.completed_at.unwrap();

        let later = stamp + chrono::Duration::minutes(5);
        let again = g.set_status("a", Status::Completed, later).unwrap();
        assert_eq!(again.completed_at, Some(stamp));
        assert_eq!(again.updated_at, later);
    }

    #[test]
    fn test_complete_blocked_by_incomplete_dependency() {
        let mut g = graph(&["x", "y"]);
        g.add_dependency("x", "y", 10).unwrap();

        let err = g.set_status("x", Status::Completed, Utc::now()).unwrap_err();
        assert_eq!(err, StoreError::InvalidOperation(InvalidOperation::DependenciesIncomplete));
        assert_eq!(g.item("x").unwrap().status, Status::NotStarted);
        assert!(g.item("x").unwrap().completed_at.is_none());
    }

    #[test]
    fn test_uncomplete_blocked_by_completed_dependent() {
        let mut g = graph(&["x", "y"]);
        g.add_dependency("y", "x", 10).unwrap();
        complete(&mut g, "x");
        complete(&mut g, "y");

        let err = g.set_status("x", Status::InProgress, Utc::now()).unwrap_err();
        assert_eq!(err, StoreError::InvalidOperation(InvalidOperation::CompletedDependents));
        assert_eq!(g.item("x").unwrap().status, Status::Completed);

        // Once the dependent is reopened the dependency may follow.
        g.set_status("y", Status::InProgress, Utc::now()).unwrap();
        let reopened = g.set_status("x", Status::InProgress, Utc::now()).unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn test_expired_cannot_be_requested() {
        let mut g = graph(&["a"]);
        let err = g.set_status("a", Status::Expired, Utc::now()).unwrap_err();
        assert_eq!(err, StoreError::InvalidOperation(InvalidOperation::ExpiredNotRequestable));
    }

    #[test]
    fn test_expired_item_can_move_on() {
        let mut g = graph(&["a"]);
        let mut expired = item("a");
        expired.status = Status::Expired;
        g.replace_item(expired).unwrap();

        assert!(g.check_transition("a", Status::Expired).is_ok());
        assert_eq!(
            g.set_status("a", Status::InProgress, Utc::now()).unwrap().status,
            Status::InProgress
        );
    }

    #[test]
    fn test_completed_item_cannot_gain_incomplete_dependency() {
        let mut g = graph(&["a", "b"]);
        complete(&mut g, "a");

        let err = g.add_dependency("a", "b", 10).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidOperation(InvalidOperation::IncompleteDependencyOnCompletedItem)
        );

        complete(&mut g, "b");
        assert!(g.add_dependency("a", "b", 10).unwrap());
    }

    #[test]
    fn test_remove_item_cascade_repairs_edges() {
        let mut g = graph(&["x", "y", "w"]);
        g.add_dependency("y", "x", 10).unwrap();
        g.add_dependency("x", "w", 10).unwrap();

        let removal = g.remove_item("x", DeletePolicy::Cascade).unwrap();
        assert_eq!(removal.item.id, "x");
        assert_eq!(
            removal.unlinked,
            vec![("y".to_string(), "x".to_string()), ("x".to_string(), "w".to_string())]
        );

        assert!(g.item("x").is_none());
        assert_eq!(g.dependencies_of("y").count(), 0);
        assert_eq!(g.dependents_of("w").count(), 0);
        assert!(g.edges().is_empty());
        assert!(g.is_symmetric());
    }

    #[test]
    fn test_remove_item_strict_refuses_with_dependents() {
        let mut g = graph(&["x", "y"]);
        g.add_dependency("y", "x", 10).unwrap();

        let err = g.remove_item("x", DeletePolicy::Strict).unwrap_err();
        assert_eq!(err, StoreError::InvalidOperation(InvalidOperation::HasDependents { count: 1 }));
        assert!(g.item("x").is_some());
        assert!(g.has_edge("y", "x"));

        // Its own dependencies do not block strict deletion.
        assert!(g.remove_item("y", DeletePolicy::Strict).is_ok());
        assert!(g.remove_item("x", DeletePolicy::Strict).is_ok());
    }

    #[test]
    fn test_load_drops_dangling_and_foreign_edges() {
        let now = Utc::now();
        let edge = |list: &str, from: &str, to: &str| Edge {
            list_id: list.to_string(),
            from_id: from.to_string(),
            to_id: to.to_string(),
            created_at: now,
            deleted: false,
        };
        let mut foreign = item("f");
        foreign.list_id = "ls-other".to_string();

        let g = ListGraph::load(
            LIST,
            vec![item("a"), item("b"), foreign],
            vec![
                edge(LIST, "a", "b"),
                edge(LIST, "a", "ghost"),
                edge(LIST, "a", "a"),
                edge("ls-other", "b", "a"),
                Edge {
                    deleted: true,
                    ..edge(LIST, "b", "a")
                },
            ],
        );

        assert_eq!(g.len(), 2);
        assert_eq!(g.edges(), vec![("a".to_string(), "b".to_string())]);
    }

    #[test]
    fn test_insert_foreign_item_rejected() {
        let mut g = ListGraph::new(LIST);
        let mut foreign = item("f");
        foreign.list_id = "ls-other".to_string();
        assert!(matches!(
            g.insert_item(foreign),
            Err(StoreError::InvalidOperation(InvalidOperation::CrossList { .. }))
        ));
    }

    #[test]
    fn test_insert_duplicate_item_rejected() {
        let mut g = graph(&["a", "b"]);
        g.add_dependency("a", "b", 10).unwrap();

        let mut again = item("b");
        again.name = "Impostor".to_string();
        assert_eq!(
            g.insert_item(again),
            Err(StoreError::from(InvalidOperation::DuplicateItem {
                item_id: "b".to_string()
            }))
        );

        // The original item and its edge are untouched.
        assert_eq!(g.item("b").map(|i| i.name.as_str()), Some("Item b"));
        assert!(g.has_edge("a", "b"));
    }

    #[test]
    fn test_view_lists_dependencies_not_dependents() {
        let mut g = graph(&["a", "b", "c"]);
        g.add_dependency("a", "b", 10).unwrap();
        g.add_dependency("c", "a", 10).unwrap();

        let view = g.view("a", Utc::now().date_naive()).unwrap();
        assert_eq!(
            view.dependencies,
            vec![DependencyRef {
                id: "b".to_string(),
                name: "Item b".to_string()
            }]
        );
        assert!(!view.can_be_completed);
        assert!(!view.expired);
    }

    #[test]
    fn test_ready() {
        let mut g = graph(&["a", "b", "c"]);
        g.add_dependency("a", "b", 10).unwrap();
        complete(&mut g, "c");

        let ready: Vec<&str> = g.ready().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ready, vec!["b"]);
    }
}
