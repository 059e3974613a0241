//! Command execution over a pooled SSH session
//!
//! Each execution opens a fresh channel, optionally feeds a sudo password on
//! stdin, and collects stdout/stderr until the channel fully closes - an exit
//! status may arrive after EOF, so the loop drains messages until the channel
//! yields `None`. On timeout the remote process is sent SIGKILL and a timeout
//! error is returned.

use std::time::{Duration, Instant};

use russh::{ChannelMsg, Sig};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::sanitize::shell_quote;
use crate::connection::Session;
use crate::error::{Result, SshMcpError};

/// Output of one remote command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: u32,
    pub duration_ms: u64,
}

/// Shape the final command line: `cd` into the working directory first, then
/// wrap with sudo. The `sh -c` layer lets shell builtins (like the `cd`)
/// compose under sudo.
pub fn shape_command(command: &str, working_dir: Option<&str>, sudo: bool) -> String {
    let mut cmd = command.to_string();

    if let Some(dir) = working_dir {
        if !dir.is_empty() {
            cmd = format!("cd {} && {}", shell_quote(dir), cmd);
        }
    }

    if sudo {
        cmd = format!("sudo -S sh -c {}", shell_quote(&cmd));
    }

    cmd
}

/// Execute a shaped command on the session.
///
/// `stdin_data` (the sudo password, when used) is written to the channel's
/// stdin followed by EOF before output collection starts.
pub async fn exec_command(
    session: &Session,
    command: &str,
    stdin_data: Option<&str>,
    timeout_duration: Duration,
) -> Result<ExecOutput> {
    let mut channel = session.open_channel().await?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| SshMcpError::exec(format!("failed to start command: {}", e)))?;

    if let Some(data) = stdin_data {
        let payload = format!("{}\n", data);
        channel
            .data(payload.as_bytes())
            .await
            .map_err(|e| SshMcpError::exec(format!("failed to write stdin: {}", e)))?;
        channel
            .eof()
            .await
            .map_err(|e| SshMcpError::exec(format!("failed to close stdin: {}", e)))?;
    }

    let start = Instant::now();

    let collected = timeout(timeout_duration, async {
        let mut stdout: Vec<u8> = Vec::new();
        let mut stderr: Vec<u8> = Vec::new();
        let mut exit_code: Option<u32> = None;
        let mut exit_signal: Option<String> = None;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    exit_signal = Some(format!("{:?}", signal_name));
                }
                None => break,
                Some(_) => {}
            }
        }

        (stdout, stderr, exit_code, exit_signal)
    })
    .await;

    match collected {
        Ok((stdout, stderr, exit_code, exit_signal)) => {
            let duration_ms = start.elapsed().as_millis() as u64;

            if exit_code.is_none() {
                if let Some(signal) = exit_signal {
                    return Err(SshMcpError::exec(format!(
                        "remote process terminated by signal {}",
                        signal
                    )));
                }
            }

            let output = ExecOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: exit_code.unwrap_or(0),
                duration_ms,
            };
            debug!(
                "command completed: exit_code={}, stdout={}B, stderr={}B, {}ms",
                output.exit_code,
                output.stdout.len(),
                output.stderr.len(),
                output.duration_ms
            );
            Ok(output)
        }
        Err(_) => {
            warn!(
                "command timed out after {}ms, sending SIGKILL",
                timeout_duration.as_millis()
            );
            let _ = channel.signal(Sig::KILL).await;
            let _ = channel.close().await;
            Err(SshMcpError::Timeout(timeout_duration.as_millis() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_plain() {
        assert_eq!(shape_command("whoami", None, false), "whoami");
    }

    #[test]
    fn test_shape_working_dir() {
        assert_eq!(
            shape_command("ls -la", Some("/var/log"), false),
            "cd '/var/log' && ls -la"
        );
    }

    #[test]
    fn test_shape_working_dir_with_quote() {
        assert_eq!(
            shape_command("ls", Some("/tmp/it's here"), false),
            "cd '/tmp/it'\\''s here' && ls"
        );
    }

    #[test]
    fn test_shape_empty_working_dir_ignored() {
        assert_eq!(shape_command("ls", Some(""), false), "ls");
    }

    #[test]
    fn test_shape_sudo() {
        assert_eq!(
            shape_command("apt update", None, true),
            "sudo -S sh -c 'apt update'"
        );
    }

    #[test]
    fn test_shape_sudo_with_working_dir() {
        // The cd must land inside the sh -c so it composes under sudo.
        assert_eq!(
            shape_command("systemctl restart app", Some("/srv/app"), true),
            "sudo -S sh -c 'cd '\\''/srv/app'\\'' && systemctl restart app'"
        );
    }

    #[test]
    fn test_exec_output_default() {
        let out = ExecOutput::default();
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.is_empty());
        assert!(out.stderr.is_empty());
    }
}
