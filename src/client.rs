//! Client for connecting to the todograph daemon.

use crate::daemon::{DaemonConfig, is_daemon_running, start_daemon};
use crate::graph::Removal;
use crate::protocol::{RemoteError, Request, Response};
use crate::query::ItemQuery;
use crate::store::{ItemUpdate, NewItem};
use crate::sweep::SweepReport;
use crate::types::{Item, List, Status};
use crate::view::{DependencyRef, ItemView};
use eyre::{Context, Result, bail};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Turn an error response into an `eyre` error carrying a [`RemoteError`],
/// and anything else that isn't the expected variant into a plain error.
macro_rules! expect_response {
    ($response:expr, $pattern:pat => $value:expr) => {
        match $response {
            $pattern => Ok($value),
            Response::Error { kind, message } => Err(eyre::eyre!(RemoteError { kind, message })),
            other => bail!("Unexpected response: {:?}", other),
        }
    };
}

/// Client for communicating with the todograph daemon.
///
/// The caller identity is fixed per client and sent with every request.
pub struct Client {
    root: PathBuf,
    caller: String,
    stream: UnixStream,
}

impl Client {
    /// Connect to the daemon, optionally auto-starting it if not running.
    pub fn connect(root: &Path, caller: impl Into<String>, auto_start: bool) -> Result<Self> {
        let config = DaemonConfig::new(root);
        let socket_path = config.socket_path();

        // Try to connect, auto-start if needed
        let stream = match UnixStream::connect(&socket_path) {
            Ok(stream) => stream,
            Err(_) if auto_start => {
                if !is_daemon_running(root) {
                    start_daemon(root).context("Failed to auto-start daemon")?;

                    // Wait for daemon to be ready
                    let mut attempts = 0;
                    loop {
                        if attempts > 20 {
                            bail!("Daemon failed to start in time");
                        }
                        std::thread::sleep(Duration::from_millis(50));
                        if let Ok(stream) = UnixStream::connect(&socket_path) {
                            break stream;
                        }
                        attempts += 1;
                    }
                } else {
                    UnixStream::connect(&socket_path).context("Failed to connect to daemon")?
                }
            }
            Err(e) => {
                bail!("Failed to connect to daemon: {}. Is it running?", e);
            }
        };

        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;

        Ok(Self {
            root: root.to_path_buf(),
            caller: caller.into(),
            stream,
        })
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Send a request and receive a response.
    pub fn request(&mut self, request: Request) -> Result<Response> {
        let request_json = serde_json::to_string(&request)?;
        writeln!(self.stream, "{}", request_json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;

        let response: Response = serde_json::from_str(&response_line).context("Failed to parse daemon response")?;
        Ok(response)
    }

    /// Create a list owned by this client's caller.
    pub fn create_list(&mut self, name: &str) -> Result<List> {
        let response = self.request(Request::CreateList {
            caller: self.caller.clone(),
            name: name.to_string(),
        })?;
        expect_response!(response, Response::List { list } => list)
    }

    pub fn lists(&mut self) -> Result<Vec<List>> {
        let response = self.request(Request::Lists {
            caller: self.caller.clone(),
        })?;
        expect_response!(response, Response::Lists { lists } => lists)
    }

    /// Create a new item.
    pub fn create_item(&mut self, list_id: &str, item: NewItem) -> Result<Item> {
        let response = self.request(Request::CreateItem {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item,
        })?;
        expect_response!(response, Response::Item { item } => item)
    }

    /// Update an existing item.
    pub fn update_item(&mut self, list_id: &str, item_id: &str, update: ItemUpdate) -> Result<Item> {
        let response = self.request(Request::UpdateItem {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
            update,
        })?;
        expect_response!(response, Response::Item { item } => item)
    }

    /// Set an item's status.
    pub fn set_status(&mut self, list_id: &str, item_id: &str, status: Status) -> Result<Item> {
        let response = self.request(Request::SetStatus {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
            status,
        })?;
        expect_response!(response, Response::Item { item } => item)
    }

    pub fn get_item(&mut self, list_id: &str, item_id: &str) -> Result<ItemView> {
        let response = self.request(Request::GetItem {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
        })?;
        expect_response!(response, Response::View { view } => view)
    }

    pub fn query_items(&mut self, list_id: &str, query: ItemQuery) -> Result<Vec<ItemView>> {
        let response = self.request(Request::QueryItems {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            query,
        })?;
        expect_response!(response, Response::Views { views } => views)
    }

    /// Delete an item using the daemon's configured policy.
    pub fn delete_item(&mut self, list_id: &str, item_id: &str) -> Result<Removal> {
        let response = self.request(Request::DeleteItem {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
            policy: None,
        })?;
        expect_response!(response, Response::Removed { removal } => removal)
    }

    /// Add a dependency edge. Returns whether it was new.
    pub fn add_dependency(&mut self, list_id: &str, item_id: &str, dependency_id: &str) -> Result<bool> {
        let response = self.request(Request::AddDependency {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
            dependency_id: dependency_id.to_string(),
        })?;
        expect_response!(response, Response::Changed { changed } => changed)
    }

    /// Remove a dependency edge. Returns whether it existed.
    pub fn remove_dependency(&mut self, list_id: &str, item_id: &str, dependency_id: &str) -> Result<bool> {
        let response = self.request(Request::RemoveDependency {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
            dependency_id: dependency_id.to_string(),
        })?;
        expect_response!(response, Response::Changed { changed } => changed)
    }

    pub fn dependencies(&mut self, list_id: &str, item_id: &str) -> Result<Vec<DependencyRef>> {
        let response = self.request(Request::Dependencies {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
        })?;
        expect_response!(response, Response::Refs { refs } => refs)
    }

    /// Get ready items.
    pub fn ready(&mut self, list_id: &str) -> Result<Vec<Item>> {
        let response = self.request(Request::Ready {
            caller: self.caller.clone(),
            list_id: list_id.to_string(),
        })?;
        expect_response!(response, Response::Items { items } => items)
    }

    /// Run the expiration sweep now.
    pub fn sweep(&mut self) -> Result<SweepReport> {
        let response = self.request(Request::Sweep)?;
        expect_response!(response, Response::Swept { report } => report)
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        let response = self.request(Request::Shutdown)?;
        expect_response!(response, Response::Ok => ())
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        let response = self.request(Request::Ping)?;
        expect_response!(response, Response::Pong => ())
    }
}
