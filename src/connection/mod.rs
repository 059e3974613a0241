//! SSH connection management
//!
//! Auth discovery, host-key verification, the remote-feature probe, and the
//! session pool with its reservation-based connect protocol.

pub mod auth;
pub mod handler;
pub mod pool;
pub mod probe;

pub use auth::{AuthDiscovery, ClientSettings, ConnectParams, HostKeyPolicy, ResolvedHost};
pub use handler::ClientHandler;
pub use pool::{Pool, Session, SessionInfo};
pub use probe::RemoteInfo;

/// Construct a session id of the shape `user@host:port`.
pub fn session_id(user: &str, host: &str, port: u16) -> String {
    format!("{}@{}:{}", user, host, port)
}
