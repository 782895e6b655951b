//! CLI argument parsing for statelock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Statelock: shared state storage with advisory locking.
///
/// Many workspaces share one bucket:
/// - The default workspace lives at `{prefix}/{key}`
/// - Named workspaces live at `{prefix}/{workspace}/{key}`
/// - Writers serialize through a lock file next to each state object
#[derive(Parser, Debug)]
#[command(name = "statelock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, short = 'c', global = true, default_value = statelock::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Show debug output on stderr (overridden by RUST_LOG).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for statelock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Workspace management commands.
    Workspace(WorkspaceCommand),

    /// Read or write a workspace's state.
    State(StateCommand),

    /// Lock management commands.
    Lock(LockCommand),
}

/// Workspace subcommands.
#[derive(Parser, Debug)]
pub struct WorkspaceCommand {
    #[command(subcommand)]
    pub action: WorkspaceAction,
}

/// Available workspace actions.
#[derive(Subcommand, Debug)]
pub enum WorkspaceAction {
    /// List all workspaces, default first.
    List,

    /// Create a workspace by writing an empty state document.
    ///
    /// Does nothing if the workspace already exists.
    New(WorkspaceNameArgs),

    /// Delete a workspace's state.
    ///
    /// Fails for the default workspace and while the workspace is locked.
    Delete(WorkspaceNameArgs),
}

/// A single workspace name argument.
#[derive(Parser, Debug)]
pub struct WorkspaceNameArgs {
    /// Workspace name (e.g., prod).
    pub name: String,
}

/// State subcommands.
#[derive(Parser, Debug)]
pub struct StateCommand {
    #[command(subcommand)]
    pub action: StateAction,
}

/// Available state actions.
#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// Print a workspace's state to stdout.
    Pull(PullArgs),

    /// Overwrite a workspace's state while holding its lock.
    Push(PushArgs),
}

/// Arguments for the `state pull` command.
#[derive(Parser, Debug)]
pub struct PullArgs {
    /// Workspace to read.
    #[arg(long, short = 'w', default_value = "default")]
    pub workspace: String,
}

/// Arguments for the `state push` command.
#[derive(Parser, Debug)]
pub struct PushArgs {
    /// File to upload; reads stdin when omitted or "-".
    pub file: Option<PathBuf>,

    /// Workspace to write.
    #[arg(long, short = 'w', default_value = "default")]
    pub workspace: String,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Acquire a workspace lock and print its id.
    ///
    /// The lock stays held until released with `lock release`.
    Acquire(LockAcquireArgs),

    /// Release a workspace lock.
    ///
    /// Passing another holder's id (see `lock info`) force-unlocks it.
    Release(LockReleaseArgs),

    /// Show who holds a workspace lock.
    Info(LockWorkspaceArgs),

    /// List all active locks.
    ///
    /// Shows every locked workspace with its holder and age.
    List,
}

/// Workspace selector shared by lock actions.
#[derive(Parser, Debug)]
pub struct LockWorkspaceArgs {
    /// Workspace whose lock to inspect.
    #[arg(long, short = 'w', default_value = "default")]
    pub workspace: String,
}

/// Arguments for the `lock acquire` command.
#[derive(Parser, Debug)]
pub struct LockAcquireArgs {
    /// Workspace to lock.
    #[arg(long, short = 'w', default_value = "default")]
    pub workspace: String,

    /// Operation recorded in the lock file.
    #[arg(long, default_value = "manual")]
    pub operation: String,

    /// Free-form note recorded in the lock file.
    #[arg(long)]
    pub note: Option<String>,

    /// Lock id to use instead of a generated one.
    #[arg(long)]
    pub id: Option<String>,
}

/// Arguments for the `lock release` command.
#[derive(Parser, Debug)]
pub struct LockReleaseArgs {
    /// Id of the lock to release.
    pub lock_id: String,

    /// Workspace to unlock.
    #[arg(long, short = 'w', default_value = "default")]
    pub workspace: String,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
