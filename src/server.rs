//! MCP server implementation
//!
//! Wires the pool, filters, and rate limiter into the rmcp `ServerHandler`:
//! advertises the enabled tools with schemars-generated input schemas and
//! dispatches calls to the handlers in [`crate::tools`]. Tool-level failures
//! are returned as error results (text), not protocol errors.

use std::future::Future;
use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::{AuthDiscovery, Pool};
use crate::error::Result;
use crate::security::{ratelimit, Filter, RateLimiter};
use crate::tools::{self, ToolContext, ToolText};

/// The SSH MCP server: tool registry plus the shared context behind it.
#[derive(Clone)]
pub struct SshMcpServer {
    cx: ToolContext,
}

impl SshMcpServer {
    /// Build the server and start its background tasks (idle session scan,
    /// rate-limiter GC). Fails fast on invalid filter patterns.
    pub fn new(config: Config) -> Result<Self> {
        let filter = Arc::new(Filter::new(
            &config.security.host_allowlist,
            &config.security.host_denylist,
            &config.security.command_allowlist,
            &config.security.command_denylist,
        )?);

        let auth = Arc::new(AuthDiscovery::new(config.ssh.clone()));
        let pool = Arc::new(Pool::new(config.ssh.clone(), Arc::clone(&auth)));
        let rate_limiter = Arc::new(RateLimiter::new(config.security.rate_limit_rpm));

        pool.start_idle_cleanup();
        rate_limiter.start_cleanup(ratelimit::CLEANUP_INTERVAL, ratelimit::CLEANUP_MAX_AGE);

        Ok(Self {
            cx: ToolContext {
                config: Arc::new(config),
                pool,
                auth,
                filter,
                rate_limiter,
            },
        })
    }

    /// Close every pooled session. Called on shutdown.
    pub async fn shutdown(&self) {
        info!("closing all SSH connections...");
        self.cx.pool.close_all().await;
    }

    fn enabled_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        let mut add = |name: &'static str, tool: Tool| {
            if !self.cx.config.is_tool_disabled(name) {
                tools.push(tool);
            }
        };

        add(
            "ssh_connect",
            tool::<tools::SshConnectInput>(
                "ssh_connect",
                "Connect to a remote host via SSH. Only 'host' is required - authentication is \
                 automatic (SSH keys from ~/.ssh/, then password if given). Returns a session_id \
                 for use with the other tools.",
            ),
        );
        add(
            "ssh_execute",
            tool::<tools::SshExecuteInput>(
                "ssh_execute",
                "Execute a command on a remote host via SSH. Supports sudo, working directory, \
                 and timeout. Returns stdout, stderr, exit code, and duration.",
            ),
        );
        add(
            "ssh_disconnect",
            tool::<tools::SshDisconnectInput>(
                "ssh_disconnect",
                "Disconnect an active SSH session. The session_id will no longer be usable.",
            ),
        );
        add(
            "ssh_list_sessions",
            tool::<tools::SshListSessionsInput>(
                "ssh_list_sessions",
                "List all active SSH sessions with their connection details and statistics.",
            ),
        );
        add(
            "ssh_upload_file",
            tool::<tools::SshUploadFileInput>(
                "ssh_upload_file",
                "Upload a local file to a remote host via SFTP. Preserves file permissions.",
            ),
        );
        add(
            "ssh_download_file",
            tool::<tools::SshDownloadFileInput>(
                "ssh_download_file",
                "Download a remote file via SFTP. Preserves file permissions.",
            ),
        );
        add(
            "ssh_edit_file",
            tool::<tools::SshEditFileInput>(
                "ssh_edit_file",
                "Edit a remote file: 'replace' writes full content, 'patch' replaces the first \
                 occurrence of old_string with new_string. Creates a .bak backup by default.",
            ),
        );
        add(
            "ssh_list_directory",
            tool::<tools::SshListDirectoryInput>(
                "ssh_list_directory",
                "List the contents of a remote directory via SFTP.",
            ),
        );
        add(
            "ssh_upload_directory",
            tool::<tools::SshUploadDirectoryInput>(
                "ssh_upload_directory",
                "Recursively upload a local directory to a remote host via SFTP.",
            ),
        );
        add(
            "ssh_download_directory",
            tool::<tools::SshDownloadDirectoryInput>(
                "ssh_download_directory",
                "Recursively download a remote directory via SFTP.",
            ),
        );
        add(
            "ssh_file_stat",
            tool::<tools::SshFileStatInput>(
                "ssh_file_stat",
                "Get metadata for a remote file or directory (size, mode, mtime, type).",
            ),
        );
        add(
            "ssh_rename",
            tool::<tools::SshRenameInput>(
                "ssh_rename",
                "Rename or move a remote file or directory via SFTP.",
            ),
        );

        tools
    }

    /// Deserialize arguments, run a handler, render its text result. Handler
    /// errors become tool error results, not protocol errors.
    async fn dispatch<I, O, F, Fut>(
        &self,
        args: JsonObject,
        handler: F,
    ) -> std::result::Result<CallToolResult, McpError>
    where
        I: DeserializeOwned,
        O: ToolText,
        F: FnOnce(ToolContext, I) -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        let input: I = serde_json::from_value(serde_json::Value::Object(args))
            .map_err(|e| McpError::invalid_params(format!("invalid arguments: {}", e), None))?;

        match handler(self.cx.clone(), input).await {
            Ok(output) => Ok(CallToolResult::success(vec![Content::text(output.text())])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Error: {}",
                e
            ))])),
        }
    }
}

/// Build a tool descriptor with a schema generated from the input type.
fn tool<T: JsonSchema>(name: &'static str, description: &'static str) -> Tool {
    let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    let schema_obj = schema.as_object().cloned().unwrap_or_default();
    Tool::new(name, description, Arc::new(schema_obj))
}

impl ServerHandler for SshMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "SSH MCP server. Call ssh_connect with a host to obtain a session_id, then use \
                 ssh_execute and the file/directory tools against that session. Sessions are \
                 pooled per user@host:port and reconnect automatically."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        debug!("list_tools called");
        Ok(ListToolsResult {
            tools: self.enabled_tools(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let tool_name: &str = request.name.as_ref();
        debug!("call_tool: {}", tool_name);

        if self.cx.config.is_tool_disabled(tool_name) {
            return Err(McpError::invalid_params(
                format!("tool {} is disabled", tool_name),
                None,
            ));
        }

        let args = request.arguments.unwrap_or_default();

        match tool_name {
            "ssh_connect" => {
                self.dispatch(args, |cx, input| async move {
                    tools::connect::handle_connect(&cx, input).await
                })
                .await
            }
            "ssh_execute" => {
                self.dispatch(args, |cx, input| async move {
                    tools::execute::handle_execute(&cx, input).await
                })
                .await
            }
            "ssh_disconnect" => {
                self.dispatch(args, |cx, input| async move {
                    tools::sessions::handle_disconnect(&cx, input).await
                })
                .await
            }
            "ssh_list_sessions" => {
                self.dispatch(args, |cx, input| async move {
                    tools::sessions::handle_list_sessions(&cx, input).await
                })
                .await
            }
            "ssh_upload_file" => {
                self.dispatch(args, |cx, input| async move {
                    tools::files::handle_upload_file(&cx, input).await
                })
                .await
            }
            "ssh_download_file" => {
                self.dispatch(args, |cx, input| async move {
                    tools::files::handle_download_file(&cx, input).await
                })
                .await
            }
            "ssh_edit_file" => {
                self.dispatch(args, |cx, input| async move {
                    tools::files::handle_edit_file(&cx, input).await
                })
                .await
            }
            "ssh_list_directory" => {
                self.dispatch(args, |cx, input| async move {
                    tools::dirs::handle_list_directory(&cx, input).await
                })
                .await
            }
            "ssh_upload_directory" => {
                self.dispatch(args, |cx, input| async move {
                    tools::dirs::handle_upload_directory(&cx, input).await
                })
                .await
            }
            "ssh_download_directory" => {
                self.dispatch(args, |cx, input| async move {
                    tools::dirs::handle_download_directory(&cx, input).await
                })
                .await
            }
            "ssh_file_stat" => {
                self.dispatch(args, |cx, input| async move {
                    tools::files::handle_file_stat(&cx, input).await
                })
                .await
            }
            "ssh_rename" => {
                self.dispatch(args, |cx, input| async move {
                    tools::files::handle_rename(&cx, input).await
                })
                .await
            }
            _ => Err(McpError::invalid_params(
                format!("Unknown tool: {}", tool_name),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use clap::Parser;

    fn test_config(extra: &[&str]) -> Config {
        let mut argv = vec!["ssh-pool-mcp"];
        argv.extend_from_slice(extra);
        Config::from_args(Args::parse_from(argv)).unwrap()
    }

    #[tokio::test]
    async fn test_all_tools_advertised() {
        let server = SshMcpServer::new(test_config(&[])).unwrap();
        let tools = server.enabled_tools();
        assert_eq!(tools.len(), 12);
        for t in &tools {
            assert!(t.name.starts_with("ssh_"));
            assert!(t.description.is_some());
        }
    }

    #[tokio::test]
    async fn test_disabled_tools_not_advertised() {
        let server =
            SshMcpServer::new(test_config(&["--disable-tools", "ssh_rename,ssh_edit_file"]))
                .unwrap();
        let tools = server.enabled_tools();
        assert_eq!(tools.len(), 10);
        assert!(!tools.iter().any(|t| t.name.as_ref() == "ssh_rename"));
        assert!(!tools.iter().any(|t| t.name.as_ref() == "ssh_edit_file"));
    }

    #[tokio::test]
    async fn test_connect_schema_has_host_property() {
        let t = tool::<tools::SshConnectInput>("ssh_connect", "desc");
        let schema = serde_json::to_value(t.input_schema.as_ref()).unwrap();
        let props = schema.get("properties").and_then(|p| p.as_object()).unwrap();
        assert!(props.contains_key("host"));
        assert!(props.contains_key("use_ssh_config"));
    }

    #[tokio::test]
    async fn test_invalid_filter_pattern_fails_fast() {
        let result = SshMcpServer::new(test_config(&["--host-allowlist", "[broken"]));
        assert!(result.is_err());
    }
}
