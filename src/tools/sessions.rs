//! ssh_disconnect and ssh_list_sessions

use crate::error::Result;

use super::types::{
    SshDisconnectInput, SshDisconnectOutput, SshListSessionsInput, SshListSessionsOutput,
};
use super::ToolContext;

/// Close a session and remove it from the pool.
pub async fn handle_disconnect(
    cx: &ToolContext,
    input: SshDisconnectInput,
) -> Result<SshDisconnectOutput> {
    cx.pool.disconnect(&input.session_id).await?;
    Ok(SshDisconnectOutput {
        message: format!("Disconnected session {}", input.session_id),
    })
}

/// List every session, including pending ones (shown as disconnected).
pub async fn handle_list_sessions(
    cx: &ToolContext,
    _input: SshListSessionsInput,
) -> Result<SshListSessionsOutput> {
    let sessions = cx.pool.list().await;
    Ok(SshListSessionsOutput {
        count: sessions.len(),
        sessions,
    })
}
