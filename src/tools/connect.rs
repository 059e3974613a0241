//! ssh_connect: open (or reuse) a pooled session

use crate::connection::auth::parse_host_string;
use crate::error::{Result, SshMcpError};

use super::types::{SshConnectInput, SshConnectOutput};
use super::ToolContext;

/// Connect to a remote host and return the session id. The host string may
/// carry user, password, and port; explicit fields override it; an SSH config
/// alias can fill in the rest.
pub async fn handle_connect(cx: &ToolContext, input: SshConnectInput) -> Result<SshConnectOutput> {
    let mut params = parse_host_string(&input.host);

    if let Some(port) = input.port {
        if port > 0 {
            params.port = port;
        }
    }
    if let Some(ref user) = input.user {
        if !user.is_empty() {
            params.user = user.clone();
        }
    }
    if let Some(ref password) = input.password {
        if !password.is_empty() {
            params.password = Some(password.clone());
        }
    }
    if let Some(ref key_path) = input.key_path {
        if !key_path.is_empty() {
            params.key_path = Some(key_path.clone());
        }
    }
    params.use_ssh_config = input.use_ssh_config.unwrap_or(false);

    if params.use_ssh_config {
        let resolved = cx.auth.resolve_host(&params.host);
        if params.host == input.host {
            // The host string was a bare alias, not overridden by parsing.
            params.host = resolved.host_name;
        }
        if input.port.is_none() && params.port == 22 {
            params.port = resolved.port;
        }
        if params.user.is_empty() {
            if let Some(user) = resolved.user {
                params.user = user;
            }
        }
        if params.key_path.is_none() {
            params.key_path = resolved.identity_file;
        }
    }

    if params.user.is_empty() {
        params.user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .map_err(|_| {
                SshMcpError::validation(
                    "no SSH user specified and could not determine current OS user; \
                     set USER env var or pass user explicitly",
                )
            })?;
    }

    cx.rate_limiter.allow(&params.host)?;
    cx.filter.allow_host(&params.host)?;

    let session_id = cx.pool.connect(&params).await?;

    let remote = match cx.pool.lookup(&session_id).await {
        Some(session) => session.remote_info().await,
        None => Default::default(),
    };

    let mut message = format!("Connected to {}", session_id);
    if !remote.is_empty() {
        message.push_str(&format!(" ({})", remote.summary()));
    }

    Ok(SshConnectOutput {
        session_id,
        host: params.host,
        port: params.port,
        user: params.user,
        message,
        os: remote.os,
        arch: remote.arch,
        shell: remote.shell,
    })
}
