//! td - task lists with dependency-aware completion.

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use todograph::{
    Client, Daemon, DaemonConfig, DeletePolicy, DependencyRef, Item, ItemQuery, ItemUpdate, ItemView, NewItem,
    RemoteError, Request, Response, Status, Store, dispatch, is_daemon_running,
};

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todograph")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("todograph.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_store_dir(cli: &Cli) -> PathBuf {
    cli.dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn get_caller(cli: &Cli) -> String {
    cli.user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "local".to_string())
}

fn format_status(status: &Status) -> ColoredString {
    match status {
        Status::NotStarted => "not_started".normal(),
        Status::InProgress => "in_progress".yellow(),
        Status::Completed => "completed".green(),
        Status::Expired => "expired".red(),
    }
}

/// Talks to the daemon when one is running, otherwise to the store directly.
enum Session {
    Local(Store),
    Remote(Client),
}

impl Session {
    fn open(root: &Path, caller: &str) -> Result<Self> {
        if is_daemon_running(root) {
            let client = Client::connect(root, caller, false).context("Failed to connect to daemon")?;
            Ok(Session::Remote(client))
        } else {
            let store = Store::open(root).context("Failed to open store")?;
            Ok(Session::Local(store))
        }
    }

    /// Send a request, turning an error response into an error.
    fn send(&mut self, request: Request) -> Result<Response> {
        let response = match self {
            Session::Local(store) => dispatch(store, request),
            Session::Remote(client) => client.request(request)?,
        };

        match response {
            Response::Error { kind, message } => Err(eyre::eyre!(RemoteError { kind, message })),
            other => Ok(other),
        }
    }
}

fn unexpected(response: Response) -> eyre::Report {
    eyre::eyre!("Unexpected response: {:?}", response)
}

fn print_item_line(item: &Item) {
    let deadline = item.deadline.map(|d| format!(" due {}", d)).unwrap_or_default();
    println!(
        "{} {} {}{}",
        format_status(&item.status),
        item.id.cyan(),
        item.name,
        deadline.dimmed()
    );
}

fn print_view_line(view: &ItemView) {
    let deadline = match view.deadline {
        Some(d) if view.expired => format!(" due {}", d).red().to_string(),
        Some(d) => format!(" due {}", d).dimmed().to_string(),
        None => String::new(),
    };
    let waiting = if view.dependencies.is_empty() {
        String::new()
    } else {
        format!(" (waits on {})", view.dependencies.len())
    };
    println!(
        "{} {} {}{}{}",
        format_status(&view.status),
        view.id.cyan(),
        view.name,
        deadline,
        waiting.dimmed()
    );
}

fn print_refs(refs: &[DependencyRef]) {
    for r in refs {
        println!("  {} {}", r.id.cyan(), r.name);
    }
}

fn run(cli: Cli) -> Result<()> {
    let store_dir = get_store_dir(&cli);
    let caller = get_caller(&cli);

    match cli.command {
        Command::Init => {
            Store::init(&store_dir).context("Failed to initialize todograph store")?;
            println!("{} Initialized todograph store in {}", "✓".green(), store_dir.display());
        }

        Command::NewList { name } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let Response::List { list } = session.send(Request::CreateList { caller, name })? else {
                bail!("Failed to create list");
            };
            println!("{} Created list: {} {}", "✓".green(), list.id.cyan(), list.name);
        }

        Command::Lists => {
            let mut session = Session::open(&store_dir, &caller)?;
            let lists = match session.send(Request::Lists { caller: caller.clone() })? {
                Response::Lists { lists } => lists,
                other => return Err(unexpected(other)),
            };

            if lists.is_empty() {
                println!("{}", format!("No lists for {}", caller).dimmed());
            } else {
                for list in lists {
                    println!("{} {}", list.id.cyan(), list.name);
                }
            }
        }

        Command::RenameList { list, name } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let Response::List { list } = session.send(Request::RenameList {
                caller,
                list_id: list,
                name,
            })?
            else {
                bail!("Failed to rename list");
            };
            println!("{} Renamed: {} {}", "✓".green(), list.id.cyan(), list.name);
        }

        Command::DeleteList { list } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let count = match session.send(Request::DeleteList {
                caller,
                list_id: list.clone(),
            })? {
                Response::Deleted { count } => count,
                other => return Err(unexpected(other)),
            };
            println!("{} Deleted list {} ({} item(s))", "✓".green(), list.cyan(), count);
        }

        Command::Add {
            list,
            name,
            description,
            deadline,
            status,
        } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let item = NewItem {
                name,
                description,
                deadline,
                status,
            };
            let Response::Item { item } = session.send(Request::CreateItem {
                caller,
                list_id: list,
                item,
            })?
            else {
                bail!("Failed to create item");
            };
            println!("{} Created: {} {}", "✓".green(), item.id.cyan(), item.name);
        }

        Command::Items {
            list,
            status,
            name,
            sort,
            desc,
            limit,
            page,
        } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let mut query = ItemQuery::new().sort_by(sort);
            if let Some(status) = status {
                query = query.status(status);
            }
            if let Some(name) = name {
                query = query.name_contains(name);
            }
            if desc {
                query = query.descending();
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            query = query.page(page);

            let views = match session.send(Request::QueryItems {
                caller,
                list_id: list,
                query,
            })? {
                Response::Views { views } => views,
                other => return Err(unexpected(other)),
            };

            if views.is_empty() {
                println!("{}", "No items found".dimmed());
            } else {
                for view in &views {
                    print_view_line(view);
                }
            }
        }

        Command::Show { list, item } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let view = match session.send(Request::GetItem {
                caller,
                list_id: list,
                item_id: item,
            })? {
                Response::View { view } => view,
                other => return Err(unexpected(other)),
            };

            println!("{}: {}", "ID".bold(), view.id.cyan());
            println!("{}: {}", "Name".bold(), view.name);
            println!("{}: {}", "Status".bold(), format_status(&view.status));
            if let Some(desc) = &view.description {
                println!("{}: {}", "Description".bold(), desc);
            }
            if let Some(deadline) = view.deadline {
                let overdue = if view.expired { " (overdue)".red().to_string() } else { String::new() };
                println!("{}: {}{}", "Deadline".bold(), deadline, overdue);
            }
            println!("{}: {}", "Created".bold(), view.created_at);
            if let Some(completed_at) = &view.completed_at {
                println!("{}: {}", "Completed".bold(), completed_at);
            }
            println!(
                "{}: {}",
                "Can complete".bold(),
                if view.can_be_completed { "yes".green() } else { "no".red() }
            );
            if !view.dependencies.is_empty() {
                println!("{}:", "Depends on".bold());
                print_refs(&view.dependencies);
            }
        }

        Command::Update {
            list,
            item,
            name,
            description,
            clear_description,
            deadline,
            clear_deadline,
            status,
        } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let update = ItemUpdate {
                name,
                description: if clear_description { Some(None) } else { description.map(Some) },
                deadline: if clear_deadline { Some(None) } else { deadline.map(Some) },
                status,
            };
            let Response::Item { item } = session.send(Request::UpdateItem {
                caller,
                list_id: list,
                item_id: item,
                update,
            })?
            else {
                bail!("Failed to update item");
            };
            println!("{} Updated:", "✓".green());
            print_item_line(&item);
        }

        Command::Start { list, item } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let Response::Item { item } = session.send(Request::SetStatus {
                caller,
                list_id: list,
                item_id: item,
                status: Status::InProgress,
            })?
            else {
                bail!("Failed to start item");
            };
            println!("{} Started: {} {}", "→".blue(), item.id.cyan(), item.name);
        }

        Command::Complete { list, item } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let Response::Item { item } = session.send(Request::SetStatus {
                caller,
                list_id: list,
                item_id: item,
                status: Status::Completed,
            })?
            else {
                bail!("Failed to complete item");
            };
            println!("{} Completed: {} {}", "✓".green(), item.id.cyan(), item.name);
        }

        Command::Depend { list, item, dependency } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let changed = match session.send(Request::AddDependency {
                caller,
                list_id: list,
                item_id: item.clone(),
                dependency_id: dependency.clone(),
            })? {
                Response::Changed { changed } => changed,
                other => return Err(unexpected(other)),
            };

            if changed {
                println!("{} {} now depends on {}", "✓".green(), item.cyan(), dependency.cyan());
            } else {
                println!("{} {} already depends on {}", "·".dimmed(), item.cyan(), dependency.cyan());
            }
        }

        Command::Undepend { list, item, dependency } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let changed = match session.send(Request::RemoveDependency {
                caller,
                list_id: list,
                item_id: item.clone(),
                dependency_id: dependency.clone(),
            })? {
                Response::Changed { changed } => changed,
                other => return Err(unexpected(other)),
            };

            if changed {
                println!("{} {} no longer depends on {}", "✓".green(), item.cyan(), dependency.cyan());
            } else {
                println!("{} {} did not depend on {}", "·".dimmed(), item.cyan(), dependency.cyan());
            }
        }

        Command::Deps { list, item, dependents } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let request = if dependents {
                Request::Dependents {
                    caller,
                    list_id: list,
                    item_id: item,
                }
            } else {
                Request::Dependencies {
                    caller,
                    list_id: list,
                    item_id: item,
                }
            };
            let refs = match session.send(request)? {
                Response::Refs { refs } => refs,
                other => return Err(unexpected(other)),
            };

            if refs.is_empty() {
                println!("{}", "None".dimmed());
            } else {
                print_refs(&refs);
            }
        }

        Command::Ready { list } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let items = match session.send(Request::Ready { caller, list_id: list })? {
                Response::Items { items } => items,
                other => return Err(unexpected(other)),
            };

            if items.is_empty() {
                println!("{}", "No ready items".dimmed());
            } else {
                println!("{} {} item(s) ready to complete:", "→".blue(), items.len());
                for item in &items {
                    print_item_line(item);
                }
            }
        }

        Command::Delete { list, item, strict } => {
            let mut session = Session::open(&store_dir, &caller)?;
            let removal = match session.send(Request::DeleteItem {
                caller,
                list_id: list,
                item_id: item,
                policy: strict.then_some(DeletePolicy::Strict),
            })? {
                Response::Removed { removal } => removal,
                other => return Err(unexpected(other)),
            };

            println!("{} Deleted: {} {}", "✓".green(), removal.item.id.cyan(), removal.item.name);
            if !removal.unlinked.is_empty() {
                println!("  {}", format!("unlinked {} dependency edge(s)", removal.unlinked.len()).dimmed());
            }
        }

        Command::Sweep => {
            let mut session = Session::open(&store_dir, &caller)?;
            let report = match session.send(Request::Sweep)? {
                Response::Swept { report } => report,
                other => return Err(unexpected(other)),
            };

            println!(
                "{} Checked {} item(s), expired {}",
                "✓".green(),
                report.checked,
                report.expired.len()
            );
            for (id, message) in &report.errors {
                println!("  {} {}: {}", "✗".red(), id.cyan(), message);
            }
        }

        Command::Daemon => {
            println!("{} Starting daemon for {}", "→".blue(), store_dir.display());

            let config = DaemonConfig::new(&store_dir);
            let mut daemon = Daemon::new(config).context("Failed to create daemon")?;

            // Run daemon in async runtime
            let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
            rt.block_on(async { daemon.run().await }).context("Daemon error")?;
        }

        Command::DaemonStop => {
            if !is_daemon_running(&store_dir) {
                println!("{} Daemon is not running", "✗".red());
                std::process::exit(1);
            }

            let mut client = Client::connect(&store_dir, caller, false).context("Failed to connect to daemon")?;
            client.shutdown().context("Failed to shutdown daemon")?;
            println!("{} Daemon stopped", "✓".green());
        }

        Command::DaemonStatus => {
            if is_daemon_running(&store_dir) {
                println!("{} Daemon is running", "✓".green());

                if let Ok(mut client) = Client::connect(&store_dir, caller, false)
                    && client.ping().is_ok()
                {
                    println!("  {} Responding to requests", "✓".green());
                }
            } else {
                println!("{} Daemon is not running", "✗".red());
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
