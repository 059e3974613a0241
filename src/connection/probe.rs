//! Remote feature probe
//!
//! Best-effort detection of the remote OS, architecture and shell right
//! after a connection is established. A POSIX probe runs first; a Windows
//! probe only runs when the POSIX one yielded no OS. Failures are logged and
//! swallowed - an empty result is not an error.

use std::time::Duration;

use russh::client::Handle;
use russh::ChannelMsg;
use serde::Serialize;
use tokio::time::timeout;
use tracing::debug;

use super::handler::ClientHandler;
use crate::error::{Result, SshMcpError};

/// Overall time allowed for both probes together.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const POSIX_PROBE: &str = "uname -s; uname -m; echo $SHELL";
const WINDOWS_PROBE: &str = "echo %OS%; echo %PROCESSOR_ARCHITECTURE%; echo %COMSPEC%";

/// Detected information about the remote host. Fields are empty when
/// detection failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoteInfo {
    pub os: String,
    pub arch: String,
    pub shell: String,
}

impl RemoteInfo {
    pub fn is_empty(&self) -> bool {
        self.os.is_empty() && self.arch.is_empty() && self.shell.is_empty()
    }

    /// Compact rendering like "Linux x86_64, /bin/bash" for text output.
    pub fn summary(&self) -> String {
        let mut s = self.os.clone();
        if !self.arch.is_empty() {
            if !s.is_empty() {
                s.push(' ');
            }
            s.push_str(&self.arch);
        }
        if !self.shell.is_empty() {
            if !s.is_empty() {
                s.push_str(", ");
            }
            s.push_str(&self.shell);
        }
        s
    }
}

/// Probe the remote host for OS, architecture, and shell.
pub async fn detect_remote_info(handle: &Handle<ClientHandler>) -> RemoteInfo {
    let result = timeout(PROBE_TIMEOUT, async {
        match run_probe(handle, POSIX_PROBE).await {
            Ok(output) => {
                let info = parse_posix_output(&output);
                if !info.os.is_empty() {
                    return info;
                }
            }
            Err(e) => debug!("POSIX probe failed: {}", e),
        }

        match run_probe(handle, WINDOWS_PROBE).await {
            Ok(output) => parse_windows_output(&output),
            Err(e) => {
                debug!("Windows probe failed: {}", e);
                RemoteInfo::default()
            }
        }
    })
    .await;

    match result {
        Ok(info) => info,
        Err(_) => {
            debug!("remote info detection timed out");
            RemoteInfo::default()
        }
    }
}

/// Run a probe command over a fresh channel and return its trimmed stdout.
async fn run_probe(handle: &Handle<ClientHandler>, command: &str) -> Result<String> {
    let mut channel = handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut output = Vec::new();
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => output.extend_from_slice(&data),
            Some(ChannelMsg::ExitStatus { exit_status }) if exit_status != 0 => {
                debug!("probe {:?} exited with status {}", command, exit_status);
            }
            Some(_) => {}
            None => break,
        }
    }

    let text = String::from_utf8_lossy(&output).trim().to_string();
    if text.is_empty() {
        return Err(SshMcpError::exec(format!("probe {:?} produced no output", command)));
    }
    Ok(text)
}

/// Parse POSIX probe output: three lines of `uname -s; uname -m; echo $SHELL`.
fn parse_posix_output(output: &str) -> RemoteInfo {
    let mut lines = output.lines();
    RemoteInfo {
        os: lines.next().unwrap_or("").trim().to_string(),
        arch: lines.next().unwrap_or("").trim().to_string(),
        shell: lines.next().unwrap_or("").trim().to_string(),
    }
}

/// Parse Windows probe output. `Windows_NT` is normalized to `Windows`; any
/// other first line is accepted only when it starts with `Windows`. Arch and
/// shell are parsed only when the OS was recognized.
fn parse_windows_output(output: &str) -> RemoteInfo {
    let mut info = RemoteInfo::default();
    let mut lines = output.lines();

    if let Some(first) = lines.next() {
        let os = first.trim();
        if os == "Windows_NT" {
            info.os = "Windows".to_string();
        } else if os.starts_with("Windows") {
            info.os = os.to_string();
        }
    }

    if info.os.is_empty() {
        return info;
    }

    info.arch = lines.next().unwrap_or("").trim().to_string();
    info.shell = lines.next().unwrap_or("").trim().to_string();
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_posix_linux() {
        let info = parse_posix_output("Linux\nx86_64\n/bin/bash");
        assert_eq!(info.os, "Linux");
        assert_eq!(info.arch, "x86_64");
        assert_eq!(info.shell, "/bin/bash");
    }

    #[test]
    fn test_parse_posix_darwin_with_whitespace() {
        let info = parse_posix_output("Darwin \n arm64 \n /bin/zsh ");
        assert_eq!(info.os, "Darwin");
        assert_eq!(info.arch, "arm64");
        assert_eq!(info.shell, "/bin/zsh");
    }

    #[test]
    fn test_parse_posix_partial() {
        let info = parse_posix_output("FreeBSD");
        assert_eq!(info.os, "FreeBSD");
        assert!(info.arch.is_empty());
        assert!(info.shell.is_empty());
    }

    #[test]
    fn test_parse_windows_nt_normalized() {
        let info = parse_windows_output("Windows_NT\nAMD64\nC:\\Windows\\system32\\cmd.exe");
        assert_eq!(info.os, "Windows");
        assert_eq!(info.arch, "AMD64");
        assert_eq!(info.shell, "C:\\Windows\\system32\\cmd.exe");
    }

    #[test]
    fn test_parse_windows_prefix_accepted() {
        let info = parse_windows_output("Windows Server\nARM64\ncmd.exe");
        assert_eq!(info.os, "Windows Server");
        assert_eq!(info.arch, "ARM64");
    }

    #[test]
    fn test_parse_windows_unrecognized_os_skips_rest() {
        // Unexpanded %OS% on a POSIX host without uname.
        let info = parse_windows_output("%OS%\n%PROCESSOR_ARCHITECTURE%\n%COMSPEC%");
        assert!(info.os.is_empty());
        assert!(info.arch.is_empty());
        assert!(info.shell.is_empty());
    }

    #[test]
    fn test_summary() {
        let info = RemoteInfo {
            os: "Linux".into(),
            arch: "x86_64".into(),
            shell: "/bin/bash".into(),
        };
        assert_eq!(info.summary(), "Linux x86_64, /bin/bash");

        let os_only = RemoteInfo {
            os: "Linux".into(),
            ..Default::default()
        };
        assert_eq!(os_only.summary(), "Linux");

        assert!(RemoteInfo::default().summary().is_empty());
        assert!(RemoteInfo::default().is_empty());
    }
}
