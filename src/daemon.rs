//! Background daemon for serialized access to the todograph store.
//!
//! The daemon provides:
//! - A single writer: all requests are handled one at a time on the main loop
//! - The periodic expiration sweep, run on the same loop as requests
//! - Lock-free client access over a Unix socket

use crate::config::DeletePolicy;
use crate::protocol::{Request, Response};
use crate::query::StoreQueryExt;
use crate::storage::STORE_DIR;
use crate::store::Store;
use crate::sweep;
use eyre::{Context, Result};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};

/// Socket file name within the .todograph directory.
const SOCKET_FILE: &str = "daemon.sock";

/// PID file name within the .todograph directory.
const PID_FILE: &str = "daemon.pid";

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory containing .todograph
    pub root: PathBuf,

    /// Sweep interval; the store config's `sweep_interval_secs` when unset.
    pub sweep_interval: Option<Duration>,
}

impl DaemonConfig {
    /// Create config with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sweep_interval: None,
        }
    }

    pub fn with_sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = Some(every);
        self
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(STORE_DIR).join(SOCKET_FILE)
    }

    /// Get the PID file path.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join(STORE_DIR).join(PID_FILE)
    }
}

/// The todograph daemon.
pub struct Daemon {
    config: DaemonConfig,
    store: Store,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let store = Store::open(&config.root).context("Failed to open store")?;

        Ok(Self {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a shutdown handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn sweep_interval(&self) -> Duration {
        self.config
            .sweep_interval
            .unwrap_or_else(|| self.store.config().sweep_interval())
    }

    /// Run the daemon (blocking).
    pub async fn run(&mut self) -> Result<()> {
        // Clean up any stale socket
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path).ok();
        }

        // Write PID file
        let pid_path = self.config.pid_path();
        fs::write(&pid_path, std::process::id().to_string()).context("Failed to write PID file")?;

        // Create Unix socket listener
        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;
        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking")?;

        log::info!("Daemon listening on {:?}", socket_path);

        // Create channel for client requests
        let (tx, mut rx) = mpsc::channel::<(Request, mpsc::Sender<Response>)>(100);

        // Spawn connection acceptor task
        let shutdown_flag = Arc::clone(&self.shutdown);
        let tx_clone = tx.clone();
        tokio::spawn(async move {
            Self::accept_connections(listener, tx_clone, shutdown_flag).await;
        });

        // Main event loop. The first tick fires immediately, so a sweep runs
        // on startup.
        let every = self.sweep_interval();
        log::info!("Expiration sweep every {:?}", every);
        let mut sweep_interval = interval(every);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Handle incoming request
                Some((request, response_tx)) = rx.recv() => {
                    let response = self.handle_request(request);
                    let _ = response_tx.send(response).await;
                }

                // Periodic expiration sweep
                _ = sweep_interval.tick() => {
                    if let Err(e) = self.store.sweep_expired(sweep::today()) {
                        log::error!("Expiration sweep failed: {:#}", e);
                    }
                }
            }

            // Check shutdown flag
            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("Daemon shutting down");
                break;
            }
        }

        // Cleanup
        fs::remove_file(&socket_path).ok();
        fs::remove_file(&pid_path).ok();

        Ok(())
    }

    /// Accept connections in a background task.
    async fn accept_connections(
        listener: UnixListener,
        tx: mpsc::Sender<(Request, mpsc::Sender<Response>)>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Try to accept connection with a small delay to allow checking shutdown
            match listener.accept() {
                Ok((stream, _)) => {
                    let tx_clone = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, tx_clone).await {
                            log::warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Handle a single client connection.
    async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<(Request, mpsc::Sender<Response>)>) -> Result<()> {
        stream.set_nonblocking(false)?;

        let reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        for line in reader.lines() {
            let line = line.context("Failed to read line")?;
            if line.is_empty() {
                continue;
            }

            let request: Request = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    let response = Response::error("invalid_request", format!("Failed to parse request: {}", e));
                    writeln!(writer, "{}", serde_json::to_string(&response)?)?;
                    writer.flush()?;
                    continue;
                }
            };

            let is_shutdown = matches!(request, Request::Shutdown);

            // Send to main loop and wait for response
            let (resp_tx, mut resp_rx) = mpsc::channel(1);
            tx.send((request, resp_tx))
                .await
                .context("Failed to send request to daemon")?;

            if let Some(response) = resp_rx.recv().await {
                let response_json = serde_json::to_string(&response)?;
                writeln!(writer, "{}", response_json)?;
                writer.flush()?;
            }

            if is_shutdown {
                break;
            }
        }

        Ok(())
    }

    /// Handle a single request.
    fn handle_request(&mut self, request: Request) -> Response {
        match request {
            Request::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::Ok
            }
            other => dispatch(&mut self.store, other),
        }
    }
}

/// Run one request against a store.
///
/// Used by the daemon loop and by the CLI when no daemon is running.
/// `Shutdown` has nothing to stop here and is answered with `Ok`.
pub fn dispatch(store: &mut Store, request: Request) -> Response {
    let today = sweep::today();

    let result = match request {
        Request::CreateList { caller, name } => store.create_list(&caller, &name).map(|list| Response::List { list }),

        Request::Lists { caller } => store.lists(&caller).map(|lists| Response::Lists { lists }),

        Request::GetList { caller, list_id } => store.get_list(&caller, &list_id).map(|list| Response::List { list }),

        Request::RenameList { caller, list_id, name } => store
            .rename_list(&caller, &list_id, &name)
            .map(|list| Response::List { list }),

        Request::DeleteList { caller, list_id } => store
            .delete_list(&caller, &list_id)
            .map(|count| Response::Deleted { count }),

        Request::CreateItem { caller, list_id, item } => store
            .create_item(&caller, &list_id, item)
            .map(|item| Response::Item { item }),

        Request::UpdateItem {
            caller,
            list_id,
            item_id,
            update,
        } => store
            .update_item(&caller, &list_id, &item_id, update, today)
            .map(|item| Response::Item { item }),

        Request::SetStatus {
            caller,
            list_id,
            item_id,
            status,
        } => store
            .set_status(&caller, &list_id, &item_id, status)
            .map(|item| Response::Item { item }),

        Request::GetItem {
            caller,
            list_id,
            item_id,
        } => store
            .get_item(&caller, &list_id, &item_id, today)
            .map(|view| Response::View { view }),

        Request::QueryItems { caller, list_id, query } => store
            .query_items(&caller, &list_id, &query, today)
            .map(|views| Response::Views { views }),

        Request::DeleteItem {
            caller,
            list_id,
            item_id,
            policy,
        } => {
            let policy: DeletePolicy = policy.unwrap_or(store.config().delete_policy);
            store
                .delete_item_with_policy(&caller, &list_id, &item_id, policy)
                .map(|removal| Response::Removed { removal })
        }

        Request::AddDependency {
            caller,
            list_id,
            item_id,
            dependency_id,
        } => store
            .add_dependency(&caller, &list_id, &item_id, &dependency_id)
            .map(|changed| Response::Changed { changed }),

        Request::RemoveDependency {
            caller,
            list_id,
            item_id,
            dependency_id,
        } => store
            .remove_dependency(&caller, &list_id, &item_id, &dependency_id)
            .map(|changed| Response::Changed { changed }),

        Request::Dependencies {
            caller,
            list_id,
            item_id,
        } => store
            .dependencies(&caller, &list_id, &item_id)
            .map(|refs| Response::Refs { refs }),

        Request::Dependents {
            caller,
            list_id,
            item_id,
        } => store
            .dependents(&caller, &list_id, &item_id)
            .map(|refs| Response::Refs { refs }),

        Request::Ready { caller, list_id } => store.ready(&caller, &list_id).map(|items| Response::Items { items }),

        Request::Sweep => store.sweep_expired(today).map(|report| Response::Swept { report }),

        Request::Shutdown => Ok(Response::Ok),

        Request::Ping => Ok(Response::Pong),
    };

    result.unwrap_or_else(|e| Response::from_report(&e))
}

/// Check if a daemon is running for the given store path.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    let pid_path = config.pid_path();

    // Check if socket exists
    if !socket_path.exists() {
        return false;
    }

    // Check if PID file exists and process is alive
    if let Ok(pid_str) = fs::read_to_string(&pid_path)
        && let Ok(pid) = pid_str.trim().parse::<i32>()
    {
        // Signal 0 checks for existence without delivering anything
        unsafe {
            if libc::kill(pid, 0) == 0 {
                return true;
            }
        }
    }

    // Stale socket, clean up
    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();
    false
}

/// Start the daemon as a background process.
pub fn start_daemon(root: &Path) -> Result<()> {
    use std::process::Command;

    let exe = std::env::current_exe().context("Failed to get current executable")?;

    Command::new(exe)
        .args(["--dir", root.to_str().unwrap_or("."), "daemon"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    // Wait a bit for daemon to start
    std::thread::sleep(Duration::from_millis(100));

    Ok(())
}
