//! Command implementations for statelock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and builds the [`StateManager`] every command runs
//! against from the config file.

mod lock;
mod state;
mod workspace;

use crate::cli::{Cli, Command};
use statelock::config::Config;
use statelock::error::Result;
use statelock::mutex::FsNamedMutex;
use statelock::retry::SystemClock;
use statelock::state::StateManager;
use statelock::store::FsObjectStore;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Directory under the store root holding mutex markers.
const MUTEX_DIR: &str = ".mutex";

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(cli: &Cli) -> Result<()> {
    let (config, manager) = open_manager(&cli.config)?;

    match &cli.command {
        Command::Workspace(cmd) => workspace::dispatch(&manager, &cmd.action),
        Command::State(cmd) => state::dispatch(&manager, &cmd.action),
        Command::Lock(cmd) => lock::dispatch(&config, &manager, &cmd.action),
    }
}

/// Load the config at `config_path` and wire the local backends to it.
///
/// A relative `store_root` is resolved against the config file's directory.
fn open_manager(config_path: &Path) -> Result<(Config, StateManager)> {
    let config = Config::load(config_path)?;

    let base = config_path.parent().unwrap_or_else(|| Path::new(""));
    let root = config.store_root_in(base);
    debug!(root = %root.display(), bucket = %config.bucket, "opening local store");

    let store = Arc::new(FsObjectStore::new(&root, &config.bucket));
    let mutex = Arc::new(FsNamedMutex::new(root.join(MUTEX_DIR)));
    let manager = StateManager::new(&config, store, mutex, Arc::new(SystemClock));

    Ok((config, manager))
}
