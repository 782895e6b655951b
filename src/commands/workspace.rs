//! Implementation of the `statelock workspace` commands.

use crate::cli::WorkspaceAction;
use statelock::error::Result;
use statelock::state::StateManager;

pub fn dispatch(manager: &StateManager, action: &WorkspaceAction) -> Result<()> {
    match action {
        WorkspaceAction::List => cmd_list(manager),
        WorkspaceAction::New(args) => cmd_new(manager, &args.name),
        WorkspaceAction::Delete(args) => cmd_delete(manager, &args.name),
    }
}

fn cmd_list(manager: &StateManager) -> Result<()> {
    for name in manager.workspaces()? {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_new(manager: &StateManager, name: &str) -> Result<()> {
    let handle = manager.ensure_initialized(name)?;
    println!("Workspace '{}' ready at {}", handle.workspace, handle.state_key);
    Ok(())
}

fn cmd_delete(manager: &StateManager, name: &str) -> Result<()> {
    manager.delete(name)?;
    println!("Deleted workspace '{}'", name);
    Ok(())
}
