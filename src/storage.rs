//! Storage layer for todograph: JSONL files + SQLite cache.
//!
//! The JSONL files are the source of truth and are only ever appended to.
//! Later lines win; deletions are recorded as tombstones. The SQLite
//! database is a cache that is rebuilt whenever its recorded line counts
//! disagree with the files on disk.

use crate::lock::StoreLock;
use crate::types::{Edge, Item, List, Status};
use chrono::{DateTime, NaiveDate, Utc};
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage directory name.
pub const STORE_DIR: &str = ".todograph";

/// JSONL file for lists.
const LISTS_FILE: &str = "lists.jsonl";

/// JSONL file for items.
const ITEMS_FILE: &str = "items.jsonl";

/// JSONL file for dependency edges.
const EDGES_FILE: &str = "edges.jsonl";

/// JSONL file for deleted lists and items.
const TOMBSTONES_FILE: &str = "tombstones.jsonl";

/// SQLite database file.
const DB_FILE: &str = "todograph.db";

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const JSONL_FILES: [&str; 4] = [LISTS_FILE, ITEMS_FILE, EDGES_FILE, TOMBSTONES_FILE];

const ITEM_COLUMNS: &str =
    "id, list_id, name, description, status, deadline, created_at, updated_at, completed_at";

/// What a tombstone deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TombstoneKind {
    List,
    Item,
}

/// Deletion marker for a list or an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    pub kind: TombstoneKind,
    pub id: String,
    pub deleted_at: DateTime<Utc>,
}

/// Storage handle for reading/writing todograph data.
pub struct Storage {
    dir: PathBuf,
    db: Connection,
}

impl Storage {
    /// Initialize storage in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(STORE_DIR);
        fs::create_dir_all(&dir).context("Failed to create .todograph directory")?;
        let _lock = StoreLock::acquire(&dir)?;

        for name in JSONL_FILES {
            let path = dir.join(name);
            if !path.exists() {
                File::create(&path).with_context(|| format!("Failed to create {}", name))?;
            }
        }

        let db = open_db(&dir)?;
        let mut storage = Self { dir, db };

        storage.init_schema()?;
        storage.rebuild_from_jsonl()?;

        Ok(storage)
    }

    /// Open existing storage.
    pub fn open(root: &Path) -> Result<Self> {
        let dir = root.join(STORE_DIR);
        if !dir.exists() {
            eyre::bail!("No .todograph directory found. Run 'td init' first.");
        }

        let _lock = StoreLock::acquire(&dir)?;
        let db = open_db(&dir)?;
        let mut storage = Self { dir, db };

        storage.init_schema()?;

        if storage.needs_rebuild()? {
            log::info!("SQLite cache out of date, rebuilding from JSONL");
            storage.rebuild_from_jsonl()?;
        }

        Ok(storage)
    }

    /// Directory holding the JSONL files, database and config.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Initialize SQLite schema.
    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS lists (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    owner TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_lists_owner ON lists(owner);

                CREATE TABLE IF NOT EXISTS items (
                    id TEXT PRIMARY KEY,
                    list_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL CHECK (status IN ('NOT_STARTED', 'IN_PROGRESS', 'COMPLETED', 'EXPIRED')),
                    deadline TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    completed_at TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_items_list ON items(list_id);

                CREATE TABLE IF NOT EXISTS edges (
                    list_id TEXT NOT NULL,
                    from_id TEXT NOT NULL,
                    to_id TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (from_id, to_id)
                );
                CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);
                CREATE INDEX IF NOT EXISTS idx_edges_list ON edges(list_id);

                CREATE TABLE IF NOT EXISTS meta (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn stored_line_count(&self, file: &str) -> i64 {
        self.db
            .query_row(
                "SELECT COALESCE((SELECT value FROM meta WHERE key = ?), '0')",
                params![meta_key(file)],
                |row| row.get::<_, String>(0),
            )
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Check if SQLite needs to be rebuilt from JSONL.
    fn needs_rebuild(&self) -> Result<bool> {
        for file in JSONL_FILES {
            let lines = count_lines(&self.path(file))?;
            if lines as i64 != self.stored_line_count(file) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rebuild SQLite cache from JSONL files.
    pub fn rebuild_from_jsonl(&mut self) -> Result<()> {
        let (list_rows, lists_lines) = read_jsonl::<List>(&self.path(LISTS_FILE))?;
        let (item_rows, items_lines) = read_jsonl::<Item>(&self.path(ITEMS_FILE))?;
        let (edge_rows, edges_lines) = read_jsonl::<Edge>(&self.path(EDGES_FILE))?;
        let (tombstones, tombstones_lines) = read_jsonl::<Tombstone>(&self.path(TOMBSTONES_FILE))?;

        let deleted: HashSet<(TombstoneKind, String)> = tombstones.into_iter().map(|t| (t.kind, t.id)).collect();

        // Last occurrence wins.
        let mut lists: HashMap<String, List> = HashMap::new();
        for list in list_rows {
            lists.insert(list.id.clone(), list);
        }
        lists.retain(|id, _| !deleted.contains(&(TombstoneKind::List, id.clone())));

        let mut items: HashMap<String, Item> = HashMap::new();
        for item in item_rows {
            items.insert(item.id.clone(), item);
        }
        items.retain(|id, item| {
            let keep = !deleted.contains(&(TombstoneKind::Item, id.clone())) && lists.contains_key(&item.list_id);
            if !keep && !deleted.contains(&(TombstoneKind::Item, id.clone())) {
                log::warn!("Dropping item {} whose list {} no longer exists", id, item.list_id);
            }
            keep
        });

        let mut edges: HashMap<(String, String), Option<Edge>> = HashMap::new();
        for edge in edge_rows {
            let key = (edge.from_id.clone(), edge.to_id.clone());
            if edge.deleted {
                edges.insert(key, None);
            } else {
                edges.insert(key, Some(edge));
            }
        }

        let tx = self.db.transaction().context("Failed to start rebuild transaction")?;
        tx.execute_batch(
            r#"
            DELETE FROM edges;
            DELETE FROM items;
            DELETE FROM lists;
        "#,
        )
        .context("Failed to clear tables")?;

        for list in lists.values() {
            insert_list(&tx, list)?;
        }
        for item in items.values() {
            insert_item(&tx, item)?;
        }
        for edge in edges.values().flatten() {
            let endpoints_ok = match (items.get(&edge.from_id), items.get(&edge.to_id)) {
                (Some(from), Some(to)) => from.list_id == edge.list_id && to.list_id == edge.list_id,
                _ => false,
            };
            if endpoints_ok && edge.from_id != edge.to_id {
                insert_edge(&tx, edge)?;
            } else {
                log::warn!("Dropping dangling edge {} -> {}", edge.from_id, edge.to_id);
            }
        }

        for (file, lines) in [
            (LISTS_FILE, lists_lines),
            (ITEMS_FILE, items_lines),
            (EDGES_FILE, edges_lines),
            (TOMBSTONES_FILE, tombstones_lines),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
                params![meta_key(file), lines.to_string()],
            )?;
        }

        tx.commit().context("Failed to commit rebuild")?;

        log::debug!(
            "Rebuilt cache: {} lists, {} items, {} edges",
            lists.len(),
            items.len(),
            edges.values().flatten().count()
        );

        Ok(())
    }

    /// Append one JSON line to a file and bump its recorded line count.
    fn append_line<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let path = self.path(file);
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {} for append", file))?;

        let json = serde_json::to_string(record).context("Failed to serialize record")?;
        writeln!(handle, "{}", json).with_context(|| format!("Failed to write to {}", file))?;
        handle.sync_all().with_context(|| format!("Failed to sync {}", file))?;

        self.db.execute(
            "UPDATE meta SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT) WHERE key = ?",
            params![meta_key(file)],
        )?;

        Ok(())
    }

    /// Append a list to the JSONL file.
    pub fn append_list(&mut self, list: &List) -> Result<()> {
        self.append_line(LISTS_FILE, list)?;
        insert_list(&self.db, list)
    }

    /// Append an item to the JSONL file.
    pub fn append_item(&mut self, item: &Item) -> Result<()> {
        self.append_line(ITEMS_FILE, item)?;
        insert_item(&self.db, item)
    }

    /// Append an edge (or edge tombstone) to the JSONL file.
    pub fn append_edge(&mut self, edge: &Edge) -> Result<()> {
        self.append_line(EDGES_FILE, edge)?;

        if edge.deleted {
            self.db.execute(
                "DELETE FROM edges WHERE from_id = ? AND to_id = ?",
                params![edge.from_id, edge.to_id],
            )?;
        } else {
            insert_edge(&self.db, edge)?;
        }

        Ok(())
    }

    /// Record the deletion of a list or item.
    pub fn append_tombstone(&mut self, tombstone: &Tombstone) -> Result<()> {
        self.append_line(TOMBSTONES_FILE, tombstone)?;

        match tombstone.kind {
            TombstoneKind::List => {
                self.db
                    .execute("DELETE FROM lists WHERE id = ?", params![tombstone.id])?;
            }
            TombstoneKind::Item => {
                self.db
                    .execute("DELETE FROM items WHERE id = ?", params![tombstone.id])?;
                self.db.execute(
                    "DELETE FROM edges WHERE from_id = ? OR to_id = ?",
                    params![tombstone.id, tombstone.id],
                )?;
            }
        }

        Ok(())
    }

    /// Get a list by ID.
    pub fn get_list(&self, id: &str) -> Result<Option<List>> {
        let list = self
            .db
            .query_row(
                "SELECT id, name, owner, created_at FROM lists WHERE id = ?",
                params![id],
                row_to_list,
            )
            .optional()?;
        Ok(list)
    }

    /// Lists owned by `owner`, oldest first.
    pub fn lists_for_owner(&self, owner: &str) -> Result<Vec<List>> {
        let mut stmt = self
            .db
            .prepare("SELECT id, name, owner, created_at FROM lists WHERE owner = ? ORDER BY created_at ASC, id ASC")?;
        let lists = stmt
            .query_map(params![owner], row_to_list)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(lists)
    }

    /// Get an item by ID, regardless of list.
    pub fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let sql = format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS);
        let item = self.db.query_row(&sql, params![id], row_to_item).optional()?;
        Ok(item)
    }

    /// All items of a list, oldest first.
    pub fn items_in_list(&self, list_id: &str) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE list_id = ? ORDER BY created_at ASC, id ASC",
            ITEM_COLUMNS
        );
        let mut stmt = self.db.prepare(&sql)?;
        let items = stmt
            .query_map(params![list_id], row_to_item)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(items)
    }

    /// Every item in the store, across all lists.
    pub fn all_items(&self) -> Result<Vec<Item>> {
        let sql = format!("SELECT {} FROM items ORDER BY list_id ASC, created_at ASC", ITEM_COLUMNS);
        let mut stmt = self.db.prepare(&sql)?;
        let items = stmt.query_map([], row_to_item)?.filter_map(|r| r.ok()).collect();
        Ok(items)
    }

    /// All live edges of a list.
    pub fn edges_in_list(&self, list_id: &str) -> Result<Vec<Edge>> {
        let mut stmt = self
            .db
            .prepare("SELECT list_id, from_id, to_id, created_at FROM edges WHERE list_id = ?")?;
        let edges = stmt
            .query_map(params![list_id], |row| {
                let created_at: String = row.get(3)?;
                Ok(Edge {
                    list_id: row.get(0)?,
                    from_id: row.get(1)?,
                    to_id: row.get(2)?,
                    created_at: parse_timestamp(&created_at),
                    deleted: false,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(edges)
    }
}

/// Open the cache, waiting out brief locks held by another handle.
fn open_db(dir: &Path) -> Result<Connection> {
    let db = Connection::open(dir.join(DB_FILE)).context("Failed to open SQLite database")?;
    db.busy_timeout(SQLITE_BUSY_TIMEOUT)
        .context("Failed to set SQLite busy timeout")?;
    Ok(db)
}

fn meta_key(file: &str) -> String {
    format!("jsonl_lines:{}", file)
}

/// Read every parseable record of a JSONL file, returning them with the
/// file's total line count.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    let mut records = Vec::new();
    let mut line_count = 0;

    if !path.exists() {
        return Ok((records, 0));
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    for line in BufReader::new(file).lines() {
        line_count += 1;
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("Failed to read {} line {}: {}", path.display(), line_count, e);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Failed to parse {} line {}: {}", path.display(), line_count, e),
        }
    }

    Ok((records, line_count))
}

fn insert_list(db: &Connection, list: &List) -> Result<()> {
    db.execute(
        "INSERT OR REPLACE INTO lists (id, name, owner, created_at) VALUES (?, ?, ?, ?)",
        params![list.id, list.name, list.owner, list.created_at.to_rfc3339()],
    )?;
    Ok(())
}

fn insert_item(db: &Connection, item: &Item) -> Result<()> {
    db.execute(
        r#"
        INSERT OR REPLACE INTO items (id, list_id, name, description, status, deadline, created_at, updated_at, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            item.id,
            item.list_id,
            item.name,
            item.description,
            item.status.as_str(),
            item.deadline.map(|d| d.to_string()),
            item.created_at.to_rfc3339(),
            item.updated_at.to_rfc3339(),
            item.completed_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(())
}

fn insert_edge(db: &Connection, edge: &Edge) -> Result<()> {
    db.execute(
        "INSERT OR REPLACE INTO edges (list_id, from_id, to_id, created_at) VALUES (?, ?, ?, ?)",
        params![edge.list_id, edge.from_id, edge.to_id, edge.created_at.to_rfc3339()],
    )?;
    Ok(())
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_list(row: &rusqlite::Row) -> rusqlite::Result<List> {
    let created_at: String = row.get(3)?;
    Ok(List {
        id: row.get(0)?,
        name: row.get(1)?,
        owner: row.get(2)?,
        created_at: parse_timestamp(&created_at),
    })
}

/// Convert a database row to an Item.
fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
    let status: String = row.get(4)?;
    let deadline: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    let completed_at: Option<String> = row.get(8)?;

    Ok(Item {
        id: row.get(0)?,
        list_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: Status::parse(&status).unwrap_or(Status::NotStarted),
        deadline: deadline.and_then(|d| d.parse::<NaiveDate>().ok()),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        completed_at: completed_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }),
    })
}

/// Count lines in a file.
fn count_lines(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let file = File::open(path).context("Failed to open file for line count")?;
    Ok(BufReader::new(file).lines().count())
}
