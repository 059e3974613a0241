//! ssh_execute: run a command on a pooled session

use std::time::Duration;

use crate::error::{Result, SshMcpError};
use crate::ssh::{exec_command, shape_command, strip_ansi};

use super::types::{SshExecuteInput, SshExecuteOutput};
use super::{session_for, ToolContext};

/// Execute a command. The command filter sees the raw command, before any
/// cd/sudo shaping, so allowlists match what the caller actually asked for.
pub async fn handle_execute(cx: &ToolContext, input: SshExecuteInput) -> Result<SshExecuteOutput> {
    if input.command.trim().is_empty() {
        return Err(SshMcpError::validation("command cannot be empty"));
    }

    let session = session_for(cx, &input.session_id, false).await?;

    cx.filter.allow_command(&input.command)?;

    let sudo = input.sudo.unwrap_or(false);
    if sudo && !cx.config.ssh.allow_sudo {
        return Err(SshMcpError::SudoDisabled);
    }

    let command = shape_command(&input.command, input.working_dir.as_deref(), sudo);

    let timeout = match input.timeout {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => cx.config.ssh.command_timeout,
    };

    let stdin = if sudo {
        input.sudo_password.as_deref().filter(|p| !p.is_empty())
    } else {
        None
    };

    session.increment_command_count().await;
    let mut output = exec_command(&session, &command, stdin, timeout).await?;

    if cx.config.ssh.strip_ansi {
        output.stdout = strip_ansi(&output.stdout);
        output.stderr = strip_ansi(&output.stderr);
    }

    Ok(SshExecuteOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
        duration_ms: output.duration_ms,
    })
}
