//! CLI argument parsing for todograph.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use todograph::{SortKey, Status};

#[derive(Parser)]
#[command(
    name = "td",
    about = "Task lists with dependency-aware completion",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/todograph/logs/todograph.log"
)]
pub struct Cli {
    /// Path to the directory holding .todograph (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    /// Act as this user (default: $USER)
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_status(s: &str) -> Result<Status, String> {
    Status::parse(s).ok_or_else(|| format!("unknown status '{}' (not_started, in_progress, completed, expired)", s))
}

fn parse_sort(s: &str) -> Result<SortKey, String> {
    SortKey::parse(s).ok_or_else(|| format!("unknown sort key '{}' (created, name, deadline, status)", s))
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new todograph store in the current directory
    Init,

    /// Create a list
    NewList {
        /// List name
        name: String,
    },

    /// Show your lists
    Lists,

    /// Rename a list
    RenameList {
        /// List ID
        list: String,

        /// New name
        name: String,
    },

    /// Delete a list and everything in it
    DeleteList {
        /// List ID
        list: String,
    },

    /// Add an item to a list
    Add {
        /// List ID
        list: String,

        /// Item name
        name: String,

        /// Description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<NaiveDate>,

        /// Initial status
        #[arg(short, long, value_parser = parse_status)]
        status: Option<Status>,
    },

    /// Show items of a list
    Items {
        /// List ID
        list: String,

        /// Filter by status (not_started, in_progress, completed, expired)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<Status>,

        /// Filter by name substring
        #[arg(short, long)]
        name: Option<String>,

        /// Sort by created, name, deadline or status
        #[arg(long, value_parser = parse_sort, default_value = "created")]
        sort: SortKey,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Page size
        #[arg(short, long)]
        limit: Option<usize>,

        /// Page number, starting at 0
        #[arg(short, long, default_value = "0")]
        page: usize,
    },

    /// Show an item
    Show {
        /// List ID
        list: String,

        /// Item ID
        item: String,
    },

    /// Update an item's fields or status
    Update {
        /// List ID
        list: String,

        /// Item ID
        item: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short = 'D', long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        /// Deadline (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_deadline")]
        deadline: Option<NaiveDate>,

        #[arg(long)]
        clear_deadline: bool,

        #[arg(short, long, value_parser = parse_status)]
        status: Option<Status>,
    },

    /// Start working on an item (set status to in_progress)
    Start {
        /// List ID
        list: String,

        /// Item ID
        item: String,
    },

    /// Mark an item completed
    Complete {
        /// List ID
        list: String,

        /// Item ID
        item: String,
    },

    /// Make an item depend on another
    Depend {
        /// List ID
        list: String,

        /// Item that waits
        item: String,

        /// Item that must be completed first
        dependency: String,
    },

    /// Remove a dependency
    Undepend {
        /// List ID
        list: String,

        /// Item that waits
        item: String,

        /// Item it no longer waits on
        dependency: String,
    },

    /// Show what an item depends on
    Deps {
        /// List ID
        list: String,

        /// Item ID
        item: String,

        /// Show the items depending on it instead
        #[arg(long)]
        dependents: bool,
    },

    /// Show items that are ready to complete
    Ready {
        /// List ID
        list: String,
    },

    /// Delete an item
    Delete {
        /// List ID
        list: String,

        /// Item ID
        item: String,

        /// Refuse if other items depend on it
        #[arg(long)]
        strict: bool,
    },

    /// Expire overdue items now
    Sweep,

    /// Run the daemon in foreground
    Daemon,

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
