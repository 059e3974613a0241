//! SSH Pool MCP Server - entry point
//!
//! Parses CLI arguments, validates configuration, starts the MCP server on
//! the stdio transport, and handles graceful shutdown.

use clap::Parser;
use rmcp::service::ServiceExt;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ssh_pool_mcp::config::{Args, Config};
use ssh_pool_mcp::error::Result;
use ssh_pool_mcp::server::SshMcpServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging goes to stderr; stdout carries MCP JSON-RPC.
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_args(args)?;

    info!("ssh-pool-mcp v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "host key verification: {}, sudo: {}, rate limit: {}/min",
        if config.ssh.verify_host_key { "on" } else { "off" },
        if config.ssh.allow_sudo { "enabled" } else { "disabled" },
        config.security.rate_limit_rpm
    );
    if !config.disabled_tools.is_empty() {
        info!("disabled tools: {}", config.disabled_tools.join(", "));
    }

    let server = SshMcpServer::new(config)?;

    // Close all pooled sessions on SIGINT/SIGTERM.
    let server_for_shutdown = server.clone();
    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = tokio::signal::unix::signal(
                        tokio::signal::unix::SignalKind::terminate()
                    ).expect("Failed to register SIGTERM handler");
                    sigterm.recv().await;
                }
                #[cfg(not(unix))]
                {
                    std::future::pending::<()>().await;
                }
            } => {
                info!("Received SIGTERM, shutting down...");
            }
        }
        server_for_shutdown.shutdown().await;
    });

    match server.serve(rmcp::transport::io::stdio()).await {
        Ok(running_server) => {
            info!("MCP server is serving...");
            if let Err(e) = running_server.waiting().await {
                error!("Server error: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to start MCP server: {}", e);
            return Err(std::io::Error::other(e.to_string()).into());
        }
    }

    shutdown_handle.abort();
    info!("ssh-pool-mcp stopped");
    Ok(())
}
