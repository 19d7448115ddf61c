//! canopy - keep a client view of a remote project's files and git state.
//!
//! Usage:
//!   canopy -p NAME watch             Follow tree changes and git status
//!   canopy -p NAME ls [PATH]         List a folder
//!   canopy -p NAME status            Show git status
//!   canopy -p NAME log               Show the commit timeline
//!   canopy -p NAME stage PATH..      Stage paths (or --all)
//!   canopy -p NAME commit -m MSG     Commit staged changes
//!   canopy --help                    Show help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use canopy_api::HttpApi;
use canopy_core::{ChangeType, DirectoryEntry, EntryKind, SyncConfig};
use canopy_git::{Connector, DiscardRelease, DiscardTarget, IndexOutcome, StatusView, TimelineItem};
use canopy_ops::DeleteRelease;
use canopy_session::Workspace;

#[derive(Parser)]
#[command(
    name = "canopy",
    version,
    about = "Keep a client view of a remote project's files and git state",
    long_about = "canopy talks to a project server and mirrors its file tree and git \
                  working tree.\n\nUse `watch` to follow changes live, or the other \
                  subcommands for one-shot operations."
)]
struct Cli {
    /// Project name on the server
    #[arg(short, long)]
    project: String,

    /// Server URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Include dotfiles in listings
    #[arg(long)]
    show_hidden: bool,

    /// Output format
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow tree changes and git status until Ctrl-C
    Watch,

    /// List a folder
    Ls {
        /// Folder path (defaults to the project root)
        #[arg(default_value = "")]
        path: String,
    },

    /// Show git status
    Status,

    /// Show the commit timeline
    Log {
        /// Number of commits to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Stage paths
    Stage {
        paths: Vec<String>,

        /// Stage every unstaged change
        #[arg(short, long, conflicts_with = "paths")]
        all: bool,
    },

    /// Unstage paths
    Unstage {
        paths: Vec<String>,

        /// Unstage everything
        #[arg(short, long, conflicts_with = "paths")]
        all: bool,
    },

    /// Discard unstaged changes
    Discard {
        /// Path to discard (omit with --all)
        path: Option<String>,

        /// Discard every unstaged change
        #[arg(short, long, conflicts_with = "path")]
        all: bool,

        /// Confirm the discard
        #[arg(short, long)]
        yes: bool,
    },

    /// Commit staged changes
    Commit {
        #[arg(short, long)]
        message: String,
    },

    /// Push local commits
    Push,

    /// Pull remote commits
    Pull,

    /// Fetch from the remote
    Fetch,

    /// List branches
    Branches,

    /// Switch branch
    Checkout {
        branch: String,

        /// Create the branch first
        #[arg(short, long)]
        create: bool,
    },

    /// Rename a file or folder in place
    Rename { path: String, name: String },

    /// Delete a file or folder
    Rm {
        path: String,

        /// Confirm the delete
        #[arg(short, long)]
        yes: bool,
    },

    /// Create an empty file
    Touch {
        /// Parent folder ("" for the root)
        parent: String,
        name: String,
    },

    /// Create a folder
    Mkdir {
        /// Parent folder ("" for the root)
        parent: String,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct IndexReport<'a> {
    verb: Option<String>,
    paths: &'a [String],
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::load_or_default()?,
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if cli.show_hidden {
        config.show_hidden = true;
    }

    debug!(project = %cli.project, server = %config.server_url, "Connecting");
    let api = HttpApi::new(&config.server_url, config.request_timeout())
        .wrap_err("Invalid server URL")?;
    let ws = Workspace::new(Arc::new(api), config, &cli.project);
    let format = cli.format;

    // Close on every path so the pollers stop before the runtime does.
    let result = run(&ws, cli.command, format).await;
    ws.close().await;
    result
}

async fn run(ws: &Workspace<HttpApi>, command: Command, format: OutputFormat) -> Result<()> {
    match command {
        Command::Watch => run_watch(ws, format).await?,
        Command::Ls { path } => run_ls(ws, &path, format).await?,
        Command::Status => {
            let view = ws.status().fetch_status().await?;
            print_status(&view, format)?;
        }
        Command::Log { limit } => run_log(ws, limit, format).await?,
        Command::Stage { paths, all } => {
            ws.status().fetch_status().await?;
            let outcome = if all {
                ws.stage_all().await?
            } else {
                ws.stage_paths(&paths).await?
            };
            print_index(&outcome, format)?;
        }
        Command::Unstage { paths, all } => {
            ws.status().fetch_status().await?;
            let outcome = if all {
                ws.unstage_all().await?
            } else {
                ws.unstage_paths(&paths).await?
            };
            print_index(&outcome, format)?;
        }
        Command::Discard { path, all, yes } => {
            ws.status().fetch_status().await?;
            let target = match (path, all) {
                (_, true) => DiscardTarget::All,
                (Some(path), false) => DiscardTarget::Path(path),
                (None, false) => bail!("Give a path to discard, or --all"),
            };
            ws.index().arm_discard(target);
            ws.index().drag_discard(if yes { 100 } else { 0 });
            match ws.release_discard().await? {
                DiscardRelease::Fired(outcome) => print_index(&outcome, format)?,
                _ => bail!("Discard not confirmed; pass --yes"),
            }
        }
        Command::Commit { message } => {
            let response = ws.commit(&message).await?;
            emit(format, &response, || println!("Committed {}", response.commit.hash))?;
        }
        Command::Push => {
            ws.status().fetch_status().await?;
            let response = ws.push().await?;
            emit(format, &response, || {
                println!("Pushed to {}", response.tracking.as_deref().unwrap_or("remote"))
            })?;
        }
        Command::Pull => {
            let response = ws.pull().await?;
            emit(format, &response, || match &response.summary {
                Some(summary) => println!("Pulled {} changes", summary.changes),
                None => println!("Pulled"),
            })?;
        }
        Command::Fetch => {
            let response = ws.fetch().await?;
            emit(format, &response, || {
                println!(
                    "ahead {}, behind {}",
                    response.ahead.unwrap_or(0),
                    response.behind.unwrap_or(0)
                )
            })?;
        }
        Command::Branches => {
            let branches = ws.git().branches().await?;
            emit(format, &branches, || {
                for branch in &branches {
                    let marker = if branch.current { "*" } else { " " };
                    println!("{marker} {:<30} {}", branch.name, branch.label);
                }
            })?;
        }
        Command::Checkout { branch, create } => {
            let response = ws.checkout(&branch, create).await?;
            emit(format, &response, || println!("Switched to {}", response.branch))?;
        }
        Command::Rename { path, name } => {
            let renamed = ws.rename(&path, &name).await?;
            emit(format, &renamed, || println!("{} -> {}", renamed.from, renamed.to))?;
        }
        Command::Rm { path, yes } => {
            ws.files().arm_delete(&path);
            ws.files().drag_delete(if yes { 100 } else { 0 });
            match ws.release_delete().await? {
                DeleteRelease::Deleted(path) => {
                    emit(format, &path, || println!("Deleted {path}"))?;
                }
                _ => bail!("Delete not confirmed; pass --yes"),
            }
        }
        Command::Touch { parent, name } => {
            let created = ws.create(&parent, &name, EntryKind::File).await?;
            emit(format, &created, || println!("Created {}", created.path))?;
        }
        Command::Mkdir { parent, name } => {
            let created = ws.create(&parent, &name, EntryKind::Folder).await?;
            emit(format, &created, || println!("Created {}/", created.path))?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `CANOPY_LOG` sets the filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CANOPY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print `value` as JSON, or run `text` for human output.
fn emit<T: Serialize + ?Sized>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}

async fn run_ls(ws: &Workspace<HttpApi>, path: &str, format: OutputFormat) -> Result<()> {
    let entries = if path.is_empty() {
        ws.loader().load_root().await?
    } else {
        ws.loader()
            .refresh_folder(path)
            .await?
            .ok_or_else(|| color_eyre::eyre::eyre!("No such folder: {path}"))?
    };
    emit(format, &*entries, || print_entries(&entries))
}

fn print_entries(entries: &[DirectoryEntry]) {
    for entry in entries {
        let (marker, size) = match entry.kind {
            EntryKind::Folder => ("/", String::new()),
            EntryKind::File => ("", format_size(entry.size)),
        };
        println!(
            "{:<40} {:>10}  {}",
            truncate(&format!("{}{marker}", entry.name), 40),
            size,
            entry.modified_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_status(view: &StatusView, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "snapshot": view.snapshot,
            "files": view.files,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let s = &view.snapshot;
    println!(
        "On branch {} (ahead {}, behind {})",
        s.branch, s.ahead, s.behind
    );
    if view.files.is_empty() {
        println!("Working tree clean");
    }
    for (path, status) in &view.files {
        println!("  {} {path}", status.badge());
    }
    for path in view.conflicted() {
        if !matches!(view.status_of(path), Some(canopy_core::FileGitStatus::Conflicted)) {
            println!("  C {path}");
        }
    }
    Ok(())
}

fn print_index(outcome: &IndexOutcome, format: OutputFormat) -> Result<()> {
    let (verb, paths) = match outcome {
        IndexOutcome::Applied { verb, paths } => (Some(verb.to_string()), paths.as_slice()),
        IndexOutcome::Ignored => (None, &[][..]),
    };
    let report = IndexReport {
        verb: verb.clone(),
        paths,
    };
    emit(format, &report, || match verb {
        Some(verb) => {
            for path in paths {
                println!("{verb} {path}");
            }
        }
        None => println!("Nothing to do"),
    })
}

async fn run_log(ws: &Workspace<HttpApi>, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    ws.status().fetch_status().await?;
    let timeline = ws
        .fetch_timeline(limit)
        .await
        .wrap_err("Failed to load commit log")?;
    let items = timeline.items();

    emit(format, &items, || {
        for item in &items {
            match item {
                TimelineItem::Divergence { default_branch } => println!(
                    "  ── branched from {} ──",
                    default_branch.as_deref().unwrap_or("default branch")
                ),
                TimelineItem::Commit { commit, connector } => {
                    let dot = if commit.is_pushed { "●" } else { "○" };
                    let mut tags = Vec::new();
                    if commit.is_head {
                        tags.push("HEAD");
                    }
                    if commit.is_remote_head {
                        tags.push("origin");
                    }
                    let tags = if tags.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", tags.join(", "))
                    };
                    println!(
                        "{dot} {} {}{tags}  {}",
                        commit.hash_short,
                        truncate(&commit.message, 60),
                        commit.author
                    );
                    match connector {
                        Some(Connector::Unpushed) => println!("┊"),
                        Some(Connector::Pushed) => println!("│"),
                        None => {}
                    }
                }
            }
        }
    })
}

async fn run_watch(ws: &Workspace<HttpApi>, format: OutputFormat) -> Result<()> {
    let root = ws.open().await.wrap_err("Failed to open project")?;
    eprintln!(
        "Watching {} ({} entries). Press Ctrl-C to stop.",
        ws.project_name(),
        root.len()
    );

    let mut changes = ws.subscribe_changes();
    let mut status = ws.subscribe_status();
    ws.start()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let set = changes.borrow_and_update().clone();
                emit(format, set.changes(), || {
                    for change in set.changes() {
                        let sign = match change.change_type {
                            ChangeType::Added => '+',
                            ChangeType::Removed => '-',
                            ChangeType::Modified => '~',
                        };
                        println!("{sign} {}", change.path);
                    }
                })?;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = status.borrow_and_update().clone();
                print_status(&view, format)?;
            }
        }
    }
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}
