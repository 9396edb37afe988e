//! todograph: multi-user task lists with a dependency-aware completion engine.
//!
//! Each list belongs to one user and holds items that may depend on other
//! items of the same list. The dependency graph is kept acyclic, an item can
//! only be completed once everything it depends on is, and overdue items are
//! expired by a periodic sweep. Data lives in append-only JSONL files with a
//! SQLite cache.
//!
//! # Example
//!
//! ```no_run
//! use todograph::{NewItem, Status, Store};
//! use std::path::Path;
//!
//! // Initialize a new store
//! let mut store = Store::init(Path::new(".")).unwrap();
//! let list = store.create_list("alice", "Move house").unwrap();
//!
//! // Create tasks
//! let pack = store.create_item("alice", &list.id, NewItem::named("Pack boxes")).unwrap();
//! let truck = store.create_item("alice", &list.id, NewItem::named("Load truck")).unwrap();
//!
//! // Loading waits on packing
//! store.add_dependency("alice", &list.id, &truck.id, &pack.id).unwrap();
//! assert!(store.complete("alice", &list.id, &truck.id).is_err());
//!
//! // Query ready work
//! let ready = store.ready("alice", &list.id).unwrap();
//! assert_eq!(ready.len(), 1);
//! assert_eq!(ready[0].id, pack.id);
//!
//! store.complete("alice", &list.id, &pack.id).unwrap();
//! let done = store.complete("alice", &list.id, &truck.id).unwrap();
//! assert_eq!(done.status, Status::Completed);
//! ```

mod id;
mod lock;
mod storage;
mod store;
mod types;

pub mod builder;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod graph;
pub mod protocol;
pub mod query;
pub mod sweep;
pub mod view;

// Re-export public API
pub use builder::{ItemBuilder, StoreBuilderExt};
pub use client::Client;
pub use config::{Config, DeletePolicy};
pub use daemon::{Daemon, DaemonConfig, dispatch, is_daemon_running, start_daemon};
pub use error::{Entity, InvalidOperation, StoreError};
pub use graph::{ListGraph, Removal};
pub use protocol::{RemoteError, Request, Response};
pub use query::{ItemQuery, SortKey, StoreQueryExt};
pub use store::{ItemUpdate, NewItem, Store};
pub use sweep::{SweepReport, is_expired, sweep_expired};
pub use types::{Edge, Item, List, Status, ValidationError};
pub use view::{DependencyRef, ItemView};
