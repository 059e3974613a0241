//! Tool input and output types
//!
//! Inputs derive `JsonSchema` so the advertised tool schemas are generated
//! from the same structs that deserialize the arguments. Outputs render a
//! human-readable text form for the MCP text result.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::connection::SessionInfo;
use crate::ssh::FileEntry;

/// Human-readable rendering of a tool result.
pub trait ToolText {
    fn text(&self) -> String;
}

/// Input for the ssh_connect tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshConnectInput {
    /// SSH host: hostname, host:port, user@host, or user:password@host:port.
    /// The only required field; everything else is auto-discovered.
    pub host: String,
    /// SSH port override (default 22)
    #[serde(default)]
    pub port: Option<u16>,
    /// SSH username override (default: current OS user)
    #[serde(default)]
    pub user: Option<String>,
    /// SSH password override
    #[serde(default)]
    pub password: Option<String>,
    /// Path to SSH private key (default: auto-discovered from ~/.ssh/)
    #[serde(default)]
    pub key_path: Option<String>,
    /// Resolve the host as an alias from the SSH config file
    #[serde(default)]
    pub use_ssh_config: Option<bool>,
}

/// Output of the ssh_connect tool.
#[derive(Debug, Serialize)]
pub struct SshConnectOutput {
    pub session_id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub arch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shell: String,
}

impl ToolText for SshConnectOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Input for the ssh_execute tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshExecuteInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Command to execute
    pub command: String,
    /// Command timeout in seconds (default from server configuration)
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Execute with sudo
    #[serde(default)]
    pub sudo: Option<bool>,
    /// Password for sudo (fed to 'sudo -S' on stdin)
    #[serde(default)]
    pub sudo_password: Option<String>,
    /// Working directory for command execution
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Output of the ssh_execute tool.
#[derive(Debug, Serialize)]
pub struct SshExecuteOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: u32,
    pub duration_ms: u64,
}

impl ToolText for SshExecuteOutput {
    fn text(&self) -> String {
        let mut out = String::new();
        if !self.stdout.is_empty() {
            out.push_str(&self.stdout);
        }
        if !self.stderr.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("[stderr] ");
            out.push_str(&self.stderr);
        }
        if self.exit_code != 0 {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("Exit code: {}", self.exit_code));
        }
        if out.is_empty() {
            out = format!(
                "Completed (exit code {}, {}ms)",
                self.exit_code, self.duration_ms
            );
        }
        out
    }
}

/// Input for the ssh_disconnect tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshDisconnectInput {
    /// Session ID to disconnect
    pub session_id: String,
}

/// Output of the ssh_disconnect tool.
#[derive(Debug, Serialize)]
pub struct SshDisconnectOutput {
    pub message: String,
}

impl ToolText for SshDisconnectOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Input for the ssh_list_sessions tool (no parameters).
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SshListSessionsInput {}

/// Output of the ssh_list_sessions tool.
#[derive(Debug, Serialize)]
pub struct SshListSessionsOutput {
    pub sessions: Vec<SessionInfo>,
    pub count: usize,
}

impl ToolText for SshListSessionsOutput {
    fn text(&self) -> String {
        if self.count == 0 {
            return "No active sessions".to_string();
        }
        let mut out = format!("Active sessions ({}):", self.count);
        for s in &self.sessions {
            let status = if s.connected {
                "connected"
            } else {
                "disconnected"
            };
            let last_used = s
                .last_used
                .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
                .unwrap_or_else(|| "never".to_string());
            out.push_str(&format!(
                "\n  {} - {}, {} commands, last used {}",
                s.session_id, status, s.command_count, last_used
            ));
            if !s.os.is_empty() {
                let mut detail = s.os.clone();
                if !s.arch.is_empty() {
                    detail.push(' ');
                    detail.push_str(&s.arch);
                }
                if !s.shell.is_empty() {
                    detail.push_str(", ");
                    detail.push_str(&s.shell);
                }
                out.push_str(&format!(" [{}]", detail));
            }
        }
        out
    }
}

/// Input for the ssh_upload_file tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshUploadFileInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Local file path to upload
    pub local_path: String,
    /// Remote destination path
    pub remote_path: String,
}

/// Output of the ssh_upload_file tool.
#[derive(Debug, Serialize)]
pub struct SshUploadFileOutput {
    pub bytes_written: u64,
    pub message: String,
}

impl ToolText for SshUploadFileOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Input for the ssh_download_file tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshDownloadFileInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Remote file path to download
    pub remote_path: String,
    /// Local destination path
    pub local_path: String,
}

/// Output of the ssh_download_file tool.
#[derive(Debug, Serialize)]
pub struct SshDownloadFileOutput {
    pub bytes_read: u64,
    pub message: String,
}

impl ToolText for SshDownloadFileOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Input for the ssh_edit_file tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshEditFileInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Remote file path to edit
    pub remote_path: String,
    /// Edit mode: "replace" (full content) or "patch" (find and replace)
    #[serde(default)]
    pub mode: Option<String>,
    /// Full file content (replace mode)
    #[serde(default)]
    pub content: Option<String>,
    /// String to find (patch mode)
    #[serde(default)]
    pub old_string: Option<String>,
    /// Replacement string (patch mode)
    #[serde(default)]
    pub new_string: Option<String>,
    /// Create a .bak backup before editing (default true)
    #[serde(default)]
    pub backup: Option<bool>,
}

/// Output of the ssh_edit_file tool.
#[derive(Debug, Serialize)]
pub struct SshEditFileOutput {
    pub bytes_written: u64,
    pub message: String,
}

impl ToolText for SshEditFileOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Input for the ssh_list_directory tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshListDirectoryInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Remote directory path to list
    pub path: String,
}

/// Output of the ssh_list_directory tool.
#[derive(Debug, Serialize)]
pub struct SshListDirectoryOutput {
    pub entries: Vec<FileEntry>,
    pub count: usize,
}

impl ToolText for SshListDirectoryOutput {
    fn text(&self) -> String {
        let mut out = format!("{} entries:", self.count);
        for e in &self.entries {
            if e.is_dir {
                out.push_str(&format!("\n  {}  {}/", e.mode, e.name));
            } else {
                out.push_str(&format!("\n  {}  {:>8}  {}", e.mode, e.size, e.name));
            }
        }
        out
    }
}

/// Input for the ssh_upload_directory tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshUploadDirectoryInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Local directory path to upload
    pub local_path: String,
    /// Remote destination directory path
    pub remote_path: String,
}

/// Output of the ssh_upload_directory tool.
#[derive(Debug, Serialize)]
pub struct SshUploadDirectoryOutput {
    pub files_uploaded: u64,
    pub bytes_written: u64,
    pub message: String,
}

impl ToolText for SshUploadDirectoryOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Input for the ssh_download_directory tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshDownloadDirectoryInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Remote directory path to download
    pub remote_path: String,
    /// Local destination directory path
    pub local_path: String,
}

/// Output of the ssh_download_directory tool.
#[derive(Debug, Serialize)]
pub struct SshDownloadDirectoryOutput {
    pub files_downloaded: u64,
    pub bytes_read: u64,
    pub message: String,
}

impl ToolText for SshDownloadDirectoryOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Input for the ssh_file_stat tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshFileStatInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Remote file or directory path
    pub remote_path: String,
    /// Follow symbolic links (default true)
    #[serde(default)]
    pub follow_symlinks: Option<bool>,
}

/// Output of the ssh_file_stat tool.
#[derive(Debug, Serialize)]
pub struct SshFileStatOutput {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mode: String,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub mod_time: String,
}

impl ToolText for SshFileStatOutput {
    fn text(&self) -> String {
        let kind = if self.is_dir {
            "directory"
        } else if self.is_symlink {
            "symlink"
        } else {
            "file"
        };
        format!(
            "{}: {}, size: {}, mode: {}, modified: {}",
            kind, self.path, self.size, self.mode, self.mod_time
        )
    }
}

/// Input for the ssh_rename tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SshRenameInput {
    /// Session ID from ssh_connect
    pub session_id: String,
    /// Current path (source)
    pub old_path: String,
    /// New path (destination)
    pub new_path: String,
}

/// Output of the ssh_rename tool.
#[derive(Debug, Serialize)]
pub struct SshRenameOutput {
    pub message: String,
}

impl ToolText for SshRenameOutput {
    fn text(&self) -> String {
        self.message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_input_minimal() {
        let input: SshConnectInput = serde_json::from_str(r#"{"host": "db1"}"#).unwrap();
        assert_eq!(input.host, "db1");
        assert!(input.port.is_none());
        assert!(input.user.is_none());
        assert!(input.use_ssh_config.is_none());
    }

    #[test]
    fn test_execute_input_full() {
        let input: SshExecuteInput = serde_json::from_str(
            r#"{"session_id": "a@b:22", "command": "ls", "timeout": 30, "sudo": true,
                "sudo_password": "pw", "working_dir": "/tmp"}"#,
        )
        .unwrap();
        assert_eq!(input.session_id, "a@b:22");
        assert_eq!(input.timeout, Some(30));
        assert_eq!(input.sudo, Some(true));
        assert_eq!(input.working_dir.as_deref(), Some("/tmp"));
    }

    #[test]
    fn test_execute_input_missing_command_fails() {
        let result: Result<SshExecuteInput, _> =
            serde_json::from_str(r#"{"session_id": "a@b:22"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_execute_text_stdout_only() {
        let out = SshExecuteOutput {
            stdout: "hello\n".into(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 12,
        };
        assert_eq!(out.text(), "hello\n");
    }

    #[test]
    fn test_execute_text_with_stderr_and_exit_code() {
        let out = SshExecuteOutput {
            stdout: "partial".into(),
            stderr: "boom".into(),
            exit_code: 2,
            duration_ms: 5,
        };
        let text = out.text();
        assert!(text.contains("partial"));
        assert!(text.contains("[stderr] boom"));
        assert!(text.contains("Exit code: 2"));
    }

    #[test]
    fn test_execute_text_empty_output() {
        let out = SshExecuteOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 42,
        };
        assert_eq!(out.text(), "Completed (exit code 0, 42ms)");
    }

    #[test]
    fn test_list_sessions_text_empty() {
        let out = SshListSessionsOutput {
            sessions: vec![],
            count: 0,
        };
        assert_eq!(out.text(), "No active sessions");
    }

    #[test]
    fn test_list_sessions_text_includes_remote_info() {
        let out = SshListSessionsOutput {
            sessions: vec![SessionInfo {
                session_id: "alice@db1:22".into(),
                host: "db1".into(),
                port: 22,
                user: "alice".into(),
                connected_at: None,
                last_used: None,
                command_count: 3,
                connected: true,
                os: "Linux".into(),
                arch: "x86_64".into(),
                shell: "/bin/bash".into(),
            }],
            count: 1,
        };
        let text = out.text();
        assert!(text.contains("alice@db1:22"));
        assert!(text.contains("connected"));
        assert!(text.contains("3 commands"));
        assert!(text.contains("[Linux x86_64, /bin/bash]"));
    }

    #[test]
    fn test_list_directory_text() {
        let out = SshListDirectoryOutput {
            entries: vec![
                FileEntry {
                    name: "logs".into(),
                    path: "/srv/logs".into(),
                    size: 0,
                    mode: "drwxr-xr-x".into(),
                    mod_time: None,
                    is_dir: true,
                    is_symlink: false,
                },
                FileEntry {
                    name: "app.conf".into(),
                    path: "/srv/app.conf".into(),
                    size: 321,
                    mode: "-rw-r--r--".into(),
                    mod_time: None,
                    is_dir: false,
                    is_symlink: false,
                },
            ],
            count: 2,
        };
        let text = out.text();
        assert!(text.starts_with("2 entries:"));
        assert!(text.contains("logs/"));
        assert!(text.contains("app.conf"));
        assert!(text.contains("321"));
    }

    #[test]
    fn test_file_stat_text_kinds() {
        let mut out = SshFileStatOutput {
            name: "x".into(),
            path: "/x".into(),
            size: 1,
            mode: "-rw-r--r--".into(),
            is_dir: false,
            is_symlink: false,
            mod_time: "2025-01-01 00:00:00".into(),
        };
        assert!(out.text().starts_with("file:"));
        out.is_symlink = true;
        assert!(out.text().starts_with("symlink:"));
        out.is_dir = true;
        assert!(out.text().starts_with("directory:"));
    }

    #[test]
    fn test_edit_input_defaults() {
        let input: SshEditFileInput =
            serde_json::from_str(r#"{"session_id": "a@b:22", "remote_path": "/tmp/f"}"#).unwrap();
        assert!(input.mode.is_none());
        assert!(input.backup.is_none());
        assert!(input.content.is_none());
    }
}
