//! Implementation of the `statelock state` commands.
//!
//! `pull` writes the raw bytes of a workspace's state to stdout. `push`
//! overwrites it from a file or stdin while holding the workspace lock.

use crate::cli::{PullArgs, PushArgs, StateAction};
use statelock::error::{Result, StateError};
use statelock::state::StateManager;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

pub fn dispatch(manager: &StateManager, action: &StateAction) -> Result<()> {
    match action {
        StateAction::Pull(args) => cmd_pull(manager, args),
        StateAction::Push(args) => cmd_push(manager, args),
    }
}

fn cmd_pull(manager: &StateManager, args: &PullArgs) -> Result<()> {
    // A workspace with no state yet prints nothing.
    let Some(payload) = manager.get(&args.workspace)? else {
        return Ok(());
    };

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&payload.data)
        .and_then(|()| stdout.flush())
        .map_err(|e| StateError::UserError(format!("failed to write state to stdout: {}", e)))
}

fn cmd_push(manager: &StateManager, args: &PushArgs) -> Result<()> {
    let data = read_input(args.file.as_deref())?;
    let handle = manager.open(&args.workspace)?;

    manager.with_lock(&handle, "push", || manager.put(&args.workspace, &data))?;
    info!(workspace = %args.workspace, bytes = data.len(), "pushed state");
    println!(
        "Pushed {} bytes to workspace '{}'",
        data.len(),
        args.workspace
    );
    Ok(())
}

/// Read the whole of `file`, or stdin when it is absent or `-`.
fn read_input(file: Option<&Path>) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    match file {
        Some(path) if path != Path::new("-") => {
            data = std::fs::read(path).map_err(|e| {
                StateError::UserError(format!("failed to read '{}': {}", path.display(), e))
            })?;
        }
        _ => {
            std::io::stdin()
                .read_to_end(&mut data)
                .map_err(|e| StateError::UserError(format!("failed to read stdin: {}", e)))?;
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn read_input_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"serial\": 3}").unwrap();

        let data = read_input(Some(file.path())).unwrap();
        assert_eq!(data, b"{\"serial\": 3}");
    }

    #[test]
    fn read_input_missing_file() {
        let err = read_input(Some(Path::new("/nonexistent/state.json"))).unwrap_err();
        assert!(matches!(err, StateError::UserError(_)));
        assert!(err.to_string().contains("failed to read"));
    }
}
