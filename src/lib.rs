//! SSH Pool MCP - a Model Context Protocol server for pooled SSH access
//!
//! Exposes remote command execution and SFTP file operations to MCP clients.
//! A client calls `ssh_connect` to obtain a durable session handle
//! (`user@host:port`), then issues further tool calls against that handle.
//!
//! The session subsystem provides:
//!
//! - a connection pool that deduplicates sessions by identity, coalesces
//!   concurrent dials through reservations, reconnects transparently on
//!   liveness failure, and evicts idle sessions;
//! - a per-host admission pipeline (rate limiting, host and command filters,
//!   path validation) in front of every operation;
//! - a best-effort remote probe detecting OS, architecture, and shell;
//! - command execution with cd/sudo shaping, timeout-with-SIGKILL, and ANSI
//!   stripping, plus SFTP-backed file and directory operations with
//!   per-operation client scoping and `~` expansion.
//!
//! # Example (CLI)
//!
//! ```bash
//! ssh-pool-mcp --host-allowlist '10\.0\.0\..*' --enable-sudo
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod security;
pub mod server;
pub mod ssh;
pub mod tools;

// Re-exports for convenience
pub use config::{Args, Config};
pub use error::{Result, SshMcpError};
pub use server::SshMcpServer;
