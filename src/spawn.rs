//! Fire-and-forget shell command execution for `on-timeout`/`on-resume`/
//! `lock_cmd`/etc. Grounded on `core/manager/processes.rs`'s detached
//! `tokio::process::Command` spawn, but the caller is never expected to
//! track or reap the child: a background task awaits it so the process
//! table doesn't accumulate zombies, matching the "wrap double-fork as a
//! single runtime-managed operation" redesign.

use std::process::Stdio;

use tokio::process::Command;

use crate::scopes::Scope;
use crate::{sdebug, swarn};

/// Spawn `cmd` via `sh -c`, detached into its own process group, with stdio
/// silenced. Returns immediately; failures to even start the shell are
/// logged, never propagated, since no caller is in a position to react to a
/// timeout/resume command failing.
pub fn spawn(cmd: &str) {
    let cmd = cmd.to_string();
    if cmd.trim().is_empty() {
        return;
    }

    sdebug!(Scope::Spawn.to_string(), "spawning: {cmd}");

    let child = Command::new("sh")
        .arg("-c")
        .arg(&cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            swarn!(Scope::Spawn.to_string(), "failed to spawn `{cmd}`: {e}");
            return;
        }
    };

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if !status.success() => {
                swarn!(Scope::Spawn.to_string(), "`{cmd}` exited with {status}");
            }
            Err(e) => swarn!(Scope::Spawn.to_string(), "failed to wait on `{cmd}`: {e}"),
            _ => {}
        }
    });
}
