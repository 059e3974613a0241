//! SSH client handler with host-key verification
//!
//! Implements `russh::client::Handler`. Depending on the resolved policy the
//! server key is either accepted unconditionally (verification disabled by
//! configuration) or checked against the configured known_hosts file.

use std::path::Path;

use russh::keys::{HashAlg, PublicKey};
use tracing::{debug, error};

use super::auth::HostKeyPolicy;
use crate::error::SshMcpError;

/// Client-side event handler for one SSH connection.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host, port, policy }
    }
}

impl russh::client::Handler for ClientHandler {
    type Error = SshMcpError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAll => {
                debug!(
                    "host key verification disabled, accepting key for {}:{}",
                    self.host, self.port
                );
                Ok(true)
            }
            HostKeyPolicy::KnownHosts(path) => {
                let known = scan_known_hosts(path, &self.host, self.port)?;
                if known.iter().any(|k| k == server_public_key) {
                    debug!("host key for {}:{} verified", self.host, self.port);
                    Ok(true)
                } else {
                    let fingerprint = server_public_key.fingerprint(HashAlg::Sha256);
                    error!(
                        "host key for {}:{} ({}) not found in {}",
                        self.host,
                        self.port,
                        fingerprint,
                        path.display()
                    );
                    Ok(false)
                }
            }
        }
    }
}

/// Collect the public keys recorded for `host:port` in a known_hosts file.
/// Marker lines (`@revoked`, `@cert-authority`) and hashed entries are
/// skipped; unparsable keys are logged and ignored.
fn scan_known_hosts(
    path: &Path,
    host: &str,
    port: u16,
) -> std::result::Result<Vec<PublicKey>, SshMcpError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        SshMcpError::auth_config(format!(
            "failed to read known_hosts {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(scan_known_hosts_content(&content, host, port))
}

fn scan_known_hosts_content(content: &str, host: &str, port: u16) -> Vec<PublicKey> {
    // Non-default ports are recorded as "[host]:port".
    let host_port = if port == 22 {
        host.to_string()
    } else {
        format!("[{}]:{}", host, port)
    };

    let mut keys = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('@') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(hosts_field) = parts.next() else {
            continue;
        };
        let Some(_key_type) = parts.next() else {
            continue;
        };
        let Some(key_data) = parts.next() else {
            continue;
        };

        if !hosts_field.split(',').any(|h| h == host_port) {
            continue;
        }

        match russh::keys::parse_public_key_base64(key_data) {
            Ok(key) => keys.push(key),
            Err(e) => {
                debug!("skipping known_hosts line {}: {}", index + 1, e);
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_B64: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIIHqmtsDyOjMb0IUax5x2c4riTzCFPuI6+VQxF005ET1";

    #[test]
    fn test_scan_matches_default_port() {
        let content = format!("example.com ssh-ed25519 {}\n", KEY_B64);
        let keys = scan_known_hosts_content(&content, "example.com", 22);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_scan_matches_bracketed_port() {
        let content = format!("[example.com]:2222 ssh-ed25519 {}\n", KEY_B64);
        assert_eq!(
            scan_known_hosts_content(&content, "example.com", 2222).len(),
            1
        );
        assert!(scan_known_hosts_content(&content, "example.com", 22).is_empty());
    }

    #[test]
    fn test_scan_comma_separated_hosts() {
        let content = format!("other.com,example.com ssh-ed25519 {}\n", KEY_B64);
        assert_eq!(
            scan_known_hosts_content(&content, "example.com", 22).len(),
            1
        );
    }

    #[test]
    fn test_scan_skips_comments_markers_and_garbage() {
        let content = format!(
            "# a comment\n@revoked example.com ssh-ed25519 {}\nexample.com ssh-ed25519 not-base64!\n\n",
            KEY_B64
        );
        assert!(scan_known_hosts_content(&content, "example.com", 22).is_empty());
    }

    #[test]
    fn test_scan_no_match_for_other_host() {
        let content = format!("example.com ssh-ed25519 {}\n", KEY_B64);
        assert!(scan_known_hosts_content(&content, "other.com", 22).is_empty());
    }

    #[test]
    fn test_scan_missing_file_is_empty() {
        let keys = scan_known_hosts(Path::new("/nonexistent/known_hosts"), "h", 22).unwrap();
        assert!(keys.is_empty());
    }
}
