//! MCP tool handlers
//!
//! One module per tool family. Every handler receives the shared
//! [`ToolContext`] and a typed input struct, runs the admission pipeline
//! (path validation, session resolution, rate limit, filters) and returns a
//! typed output with a human-readable `text()` rendering.

pub mod connect;
pub mod dirs;
pub mod execute;
pub mod files;
pub mod sessions;
pub mod types;

use std::sync::Arc;

use crate::config::Config;
use crate::connection::{AuthDiscovery, Pool, Session};
use crate::error::Result;
use crate::security::{Filter, RateLimiter};

pub use types::*;

/// Shared dependencies handed to every tool handler.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Config>,
    pub pool: Arc<Pool>,
    pub auth: Arc<AuthDiscovery>,
    pub filter: Arc<Filter>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Resolve a session and apply the per-host rate limit. File operations are
/// rate limited only when the configuration says so.
pub(crate) async fn session_for(
    cx: &ToolContext,
    session_id: &str,
    file_op: bool,
) -> Result<Arc<Session>> {
    let session = cx.pool.get(session_id).await?;
    if !file_op || cx.config.security.rate_limit_file_ops {
        cx.rate_limiter.allow(&session.host)?;
    }
    Ok(session)
}
