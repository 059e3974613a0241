//! Error types for the SSH MCP server

use thiserror::Error;

/// Main error type for the SSH MCP server
#[derive(Debug, Error)]
pub enum SshMcpError {
    /// Configuration error (CLI arguments, filter patterns)
    #[error("configuration error: {0}")]
    Config(String),

    /// Path or filename validation failure
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication setup failure (no usable methods, missing known_hosts)
    #[error("auth config: {0}")]
    AuthConfig(String),

    /// Network or handshake failure while dialing
    #[error("SSH dial {addr}: {reason}")]
    Dial { addr: String, reason: String },

    /// Session id not present in the pool
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// The session's connection attempt finished with an error
    #[error("session {id} connection failed: {reason}")]
    ConnectionFailed { id: String, reason: String },

    /// Liveness was lost and the in-place reconnect attempt failed
    #[error("reconnect {id}: {reason}")]
    ReconnectFailed { id: String, reason: String },

    /// Per-host rate limit exceeded
    #[error("rate limit exceeded for host {host:?} (limit: {rpm} requests/min)")]
    RateLimited { host: String, rpm: u32 },

    /// Host or command rejected by the security filter
    #[error("{0}")]
    FilterDenied(String),

    /// Sudo requested but not permitted by configuration
    #[error("sudo is disabled; start server with --enable-sudo to allow")]
    SudoDisabled,

    /// Command exceeded its deadline; the remote process was sent SIGKILL
    #[error("command timed out after {0}ms")]
    Timeout(u64),

    /// Non-exit-status execution failure
    #[error("execute command: {0}")]
    Exec(String),

    /// Remote file exceeds the configured read cap
    #[error("file {path} is {size} bytes, exceeds maximum allowed size of {limit} bytes")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    /// Patch edit could not find its target
    #[error("old_string not found in {0}")]
    PatchTargetMissing(String),

    /// SFTP operation failure
    #[error("SFTP: {0}")]
    Sftp(String),

    /// SSH key loading or parsing error
    #[error("SSH key error: {0}")]
    Key(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol-level error from the SSH library
    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),
}

/// Result type alias using SshMcpError
pub type Result<T> = std::result::Result<T, SshMcpError>;

impl SshMcpError {
    /// Create a configuration error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        SshMcpError::Config(msg.into())
    }

    /// Create a validation error from a string
    pub fn validation(msg: impl Into<String>) -> Self {
        SshMcpError::Validation(msg.into())
    }

    /// Create an auth-config error from a string
    pub fn auth_config(msg: impl Into<String>) -> Self {
        SshMcpError::AuthConfig(msg.into())
    }

    /// Create an execution error from a string
    pub fn exec(msg: impl Into<String>) -> Self {
        SshMcpError::Exec(msg.into())
    }

    /// Create an SFTP error from a string
    pub fn sftp(msg: impl Into<String>) -> Self {
        SshMcpError::Sftp(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SshMcpError::SessionNotFound("alice@db1:22".to_string());
        assert_eq!(err.to_string(), "session alice@db1:22 not found");

        let err = SshMcpError::Timeout(5000);
        assert_eq!(err.to_string(), "command timed out after 5000ms");

        let err = SshMcpError::RateLimited {
            host: "db1".to_string(),
            rpm: 60,
        };
        assert!(err.to_string().contains("db1"));
        assert!(err.to_string().contains("60"));
    }

    #[test]
    fn test_file_too_large_display() {
        let err = SshMcpError::FileTooLarge {
            path: "/etc/big".to_string(),
            size: 2048,
            limit: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/big"));
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }
}
