//! Configuration and CLI argument parsing for the SSH MCP server

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Result, SshMcpError};

/// Default command execution timeout in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Connection timeout for the SSH dial
pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Idle sessions older than this are evicted by the background scan
pub const MAX_IDLE_SECS: u64 = 300;

/// SSH MCP Server CLI Arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "ssh-pool-mcp")]
#[command(version)]
#[command(about = "MCP server providing AI agents with SSH access to remote hosts")]
pub struct Args {
    /// Disable host key verification against known_hosts
    #[arg(long, env = "MCP_SSH_NO_VERIFY_HOST_KEY")]
    pub no_verify_host_key: bool,

    /// Path to known_hosts file (default: ~/.ssh/known_hosts)
    #[arg(long, env = "MCP_SSH_KNOWN_HOSTS")]
    pub known_hosts: Option<PathBuf>,

    /// Path to SSH config file (default: ~/.ssh/config)
    #[arg(long = "ssh-config", env = "MCP_SSH_CONFIG")]
    pub ssh_config: Option<PathBuf>,

    /// Allow sudo execution via ssh_execute
    #[arg(long, env = "MCP_SSH_ENABLE_SUDO")]
    pub enable_sudo: bool,

    /// Command execution timeout in seconds
    #[arg(long, default_value = "60", env = "MCP_SSH_COMMAND_TIMEOUT")]
    pub command_timeout: u64,

    /// Host allowlist patterns: anchored regex or CIDR (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', env = "MCP_SSH_HOST_ALLOWLIST")]
    pub host_allowlist: Vec<String>,

    /// Host denylist patterns: anchored regex or CIDR (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', env = "MCP_SSH_HOST_DENYLIST")]
    pub host_denylist: Vec<String>,

    /// Command allowlist regex patterns (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', env = "MCP_SSH_COMMAND_ALLOWLIST")]
    pub command_allowlist: Vec<String>,

    /// Command denylist regex patterns (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', env = "MCP_SSH_COMMAND_DENYLIST")]
    pub command_denylist: Vec<String>,

    /// Rate limit in requests per minute, per host
    #[arg(long, default_value = "60", env = "MCP_SSH_RATE_LIMIT")]
    pub rate_limit: u32,

    /// Apply rate limiting to SFTP file operations as well
    #[arg(long, env = "MCP_SSH_RATE_LIMIT_FILE_OPS")]
    pub rate_limit_file_ops: bool,

    /// Restrict local file operations to this directory
    #[arg(long, env = "MCP_SSH_LOCAL_BASE_DIR")]
    pub local_base_dir: Option<PathBuf>,

    /// Maximum file size in bytes for read operations (0 = unlimited)
    #[arg(long, default_value = "0", env = "MCP_SSH_MAX_FILE_SIZE")]
    pub max_file_size: u64,

    /// Maximum number of concurrent SSH connections (0 = unbounded)
    #[arg(long, default_value = "0", env = "MCP_SSH_MAX_CONNECTIONS")]
    pub max_connections: usize,

    /// Keep ANSI escape sequences in command output
    #[arg(long, env = "MCP_SSH_NO_STRIP_ANSI")]
    pub no_strip_ansi: bool,

    /// Disable specific tools (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', env = "MCP_SSH_DISABLE_TOOLS")]
    pub disable_tools: Vec<String>,
}

/// SSH-related settings consumed by the connection pool and executor
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub known_hosts_path: PathBuf,
    pub verify_host_key: bool,
    pub ssh_config_path: PathBuf,
    pub key_search_paths: Vec<PathBuf>,
    pub command_timeout: Duration,
    pub connection_timeout: Duration,
    pub max_idle_time: Duration,
    pub allow_sudo: bool,
    pub strip_ansi: bool,
    /// 0 means unbounded
    pub max_connections: usize,
}

/// Security-related settings consumed by the filters and validators
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub host_allowlist: Vec<String>,
    pub host_denylist: Vec<String>,
    pub command_allowlist: Vec<String>,
    pub command_denylist: Vec<String>,
    /// Requests per minute, per host
    pub rate_limit_rpm: u32,
    pub rate_limit_file_ops: bool,
    pub local_base_dir: Option<PathBuf>,
    /// 0 means unlimited
    pub max_file_size: u64,
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub ssh: SshSettings,
    pub security: SecuritySettings,
    pub disabled_tools: Vec<String>,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        let ssh_dir = PathBuf::from(shellexpand::tilde("~/.ssh").into_owned());

        let config = Config {
            ssh: SshSettings {
                known_hosts_path: args
                    .known_hosts
                    .unwrap_or_else(|| ssh_dir.join("known_hosts")),
                verify_host_key: !args.no_verify_host_key,
                ssh_config_path: args.ssh_config.unwrap_or_else(|| ssh_dir.join("config")),
                key_search_paths: default_key_paths(&ssh_dir),
                command_timeout: Duration::from_secs(args.command_timeout),
                connection_timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
                max_idle_time: Duration::from_secs(MAX_IDLE_SECS),
                allow_sudo: args.enable_sudo,
                strip_ansi: !args.no_strip_ansi,
                max_connections: args.max_connections,
            },
            security: SecuritySettings {
                host_allowlist: clean_list(args.host_allowlist),
                host_denylist: clean_list(args.host_denylist),
                command_allowlist: clean_list(args.command_allowlist),
                command_denylist: clean_list(args.command_denylist),
                rate_limit_rpm: args.rate_limit,
                rate_limit_file_ops: args.rate_limit_file_ops,
                local_base_dir: args.local_base_dir,
                max_file_size: args.max_file_size,
            },
            disabled_tools: clean_list(args.disable_tools),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for errors and normalize the local base dir
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.ssh.command_timeout.is_zero() {
            errors.push("command timeout must be positive".to_string());
        }
        if self.security.rate_limit_rpm == 0 {
            errors.push("rate limit must be positive".to_string());
        }
        if let Some(ref base) = self.security.local_base_dir {
            match base.metadata() {
                Ok(meta) if meta.is_dir() => {}
                _ => errors.push(format!(
                    "local base dir {:?} does not exist or is not a directory",
                    base
                )),
            }
        }

        if !errors.is_empty() {
            return Err(SshMcpError::config(errors.join("; ")));
        }
        Ok(())
    }

    /// Whether a tool name appears in the disable list
    pub fn is_tool_disabled(&self, name: &str) -> bool {
        self.disabled_tools.iter().any(|t| t == name)
    }
}

/// Default private key locations probed during auth discovery, in order.
fn default_key_paths(ssh_dir: &std::path::Path) -> Vec<PathBuf> {
    ["id_rsa", "id_ed25519", "id_ecdsa", "id_dsa"]
        .iter()
        .map(|name| ssh_dir.join(name))
        .collect()
}

/// Drop empty entries left over from comma splitting.
fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["ssh-pool-mcp"])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_args(base_args()).unwrap();
        assert!(config.ssh.verify_host_key);
        assert!(config.ssh.strip_ansi);
        assert!(!config.ssh.allow_sudo);
        assert_eq!(config.ssh.command_timeout, Duration::from_secs(60));
        assert_eq!(config.ssh.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.ssh.max_idle_time, Duration::from_secs(300));
        assert_eq!(config.ssh.max_connections, 0);
        assert_eq!(config.security.rate_limit_rpm, 60);
        assert_eq!(config.security.max_file_size, 0);
        assert!(config.security.host_allowlist.is_empty());
        assert!(config.disabled_tools.is_empty());
    }

    #[test]
    fn test_key_search_paths_order() {
        let config = Config::from_args(base_args()).unwrap();
        let names: Vec<_> = config
            .ssh
            .key_search_paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["id_rsa", "id_ed25519", "id_ecdsa", "id_dsa"]);
    }

    #[test]
    fn test_comma_separated_lists() {
        let args = Args::parse_from([
            "ssh-pool-mcp",
            "--host-denylist",
            "10\\..*,192\\.168\\..*",
            "--disable-tools",
            "ssh_rename, ssh_edit_file",
        ]);
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.security.host_denylist.len(), 2);
        assert!(config.is_tool_disabled("ssh_rename"));
        assert!(config.is_tool_disabled("ssh_edit_file"));
        assert!(!config.is_tool_disabled("ssh_connect"));
    }

    #[test]
    fn test_zero_command_timeout_rejected() {
        let args = Args::parse_from(["ssh-pool-mcp", "--command-timeout", "0"]);
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let args = Args::parse_from(["ssh-pool-mcp", "--rate-limit", "0"]);
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_missing_base_dir_rejected() {
        let args = Args::parse_from([
            "ssh-pool-mcp",
            "--local-base-dir",
            "/nonexistent/base/dir/for/test",
        ]);
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn test_flags_flip_defaults() {
        let args = Args::parse_from([
            "ssh-pool-mcp",
            "--no-verify-host-key",
            "--enable-sudo",
            "--no-strip-ansi",
            "--max-connections",
            "4",
        ]);
        let config = Config::from_args(args).unwrap();
        assert!(!config.ssh.verify_host_key);
        assert!(config.ssh.allow_sudo);
        assert!(!config.ssh.strip_ansi);
        assert_eq!(config.ssh.max_connections, 4);
    }
}
