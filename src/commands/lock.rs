//! Implementation of the `statelock lock` commands.

use crate::cli::{LockAcquireArgs, LockAction, LockReleaseArgs};
use statelock::config::Config;
use statelock::error::Result;
use statelock::locks::{LockInfo, LockRecord};
use statelock::state::StateManager;
use std::fmt::Write;

pub fn dispatch(config: &Config, manager: &StateManager, action: &LockAction) -> Result<()> {
    match action {
        LockAction::Acquire(args) => cmd_acquire(manager, args),
        LockAction::Release(args) => cmd_release(manager, args),
        LockAction::Info(args) => cmd_info(manager, &args.workspace),
        LockAction::List => cmd_list(config, manager),
    }
}

fn cmd_acquire(manager: &StateManager, args: &LockAcquireArgs) -> Result<()> {
    let mut record = LockRecord::new(&args.operation);
    if let Some(note) = &args.note {
        record = record.with_note(note);
    }
    if let Some(id) = &args.id {
        record.id = id.clone();
    }

    let id = manager.lock(&args.workspace, &record)?;
    println!("{}", id);
    Ok(())
}

fn cmd_release(manager: &StateManager, args: &LockReleaseArgs) -> Result<()> {
    manager.unlock(&args.workspace, &args.lock_id)?;
    println!(
        "Released lock {} on workspace '{}'",
        args.lock_id, args.workspace
    );
    Ok(())
}

fn cmd_info(manager: &StateManager, workspace: &str) -> Result<()> {
    let record = manager.lock_info(workspace)?;
    println!("Lock Info:");
    println!("{}", record);
    Ok(())
}

fn cmd_list(config: &Config, manager: &StateManager) -> Result<()> {
    let locks = manager.list_locks()?;
    print!("{}", render_lock_list(&locks, config.lock_stale_minutes));
    Ok(())
}

/// Human-readable report of active locks.
fn render_lock_list(locks: &[LockInfo], stale_minutes: u32) -> String {
    if locks.is_empty() {
        return "No active locks.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Active locks ({}):", locks.len());
    let _ = writeln!(out);

    for lock in locks {
        let _ = writeln!(out, "  {}:", lock.workspace);
        let _ = writeln!(out, "    ID:         {}", lock.record.id);
        let _ = writeln!(out, "    Who:        {}", lock.record.who);
        let _ = writeln!(
            out,
            "    Created:    {}",
            lock.record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "    Age:        {}", lock.record.age_string());
        let _ = writeln!(out, "    Operation:  {}", lock.record.operation);
        if !lock.record.note.is_empty() {
            let _ = writeln!(out, "    Info:       {}", lock.record.note);
        }
        if lock.is_stale {
            let _ = writeln!(
                out,
                "    Status:     STALE (exceeds {} min threshold)",
                stale_minutes
            );
        }
        let _ = writeln!(out, "    Key:        {}", lock.lock_key);
        let _ = writeln!(out);
    }

    // Summary
    let stale_count = locks.iter().filter(|l| l.is_stale).count();
    if stale_count > 0 {
        let _ = writeln!(
            out,
            "Note: {} lock(s) are stale. \
             Use `statelock lock release <lock-id> -w <workspace>` to force-unlock.",
            stale_count
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn info(workspace: &str, id: &str, is_stale: bool) -> LockInfo {
        let mut record = LockRecord::new("apply");
        record.id = id.to_string();
        if is_stale {
            record.created_at = Utc::now() - Duration::hours(5);
        }
        LockInfo {
            workspace: workspace.to_string(),
            lock_key: format!("env:/{}/state.lock", workspace),
            record,
            is_stale,
        }
    }

    #[test]
    fn render_empty_lock_list() {
        assert_eq!(render_lock_list(&[], 120), "No active locks.\n");
    }

    #[test]
    fn render_lock_list_with_stale_entry() {
        let out = render_lock_list(&[info("a", "id-a", false), info("b", "id-b", true)], 120);

        assert!(out.starts_with("Active locks (2):"));
        assert!(out.contains("id-a"));
        assert!(out.contains("env:/b/state.lock"));
        assert!(out.contains("STALE (exceeds 120 min threshold)"));
        assert!(out.contains("1 lock(s) are stale"));
    }
}
