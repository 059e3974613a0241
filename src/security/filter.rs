//! Host and command allow/deny filtering
//!
//! Host patterns compile to either a CIDR range (pattern contains `/` and
//! parses as one) or a regex; command patterns are always regex. Regex
//! patterns are auto-anchored with `^`/`$` so `rm` cannot accidentally match
//! `format`. The denylist always wins over the allowlist.

use std::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;

use crate::error::{Result, SshMcpError};

/// A single compiled host pattern.
#[derive(Debug)]
enum HostMatcher {
    Regex(Regex),
    Cidr { net: IpNet, pattern: String },
}

impl HostMatcher {
    fn matches(&self, host: &str) -> bool {
        match self {
            HostMatcher::Regex(re) => re.is_match(host),
            HostMatcher::Cidr { net, .. } => match host.parse::<IpAddr>() {
                Ok(ip) => net.contains(&ip),
                Err(_) => false,
            },
        }
    }

    fn pattern(&self) -> &str {
        match self {
            HostMatcher::Regex(re) => re.as_str(),
            HostMatcher::Cidr { pattern, .. } => pattern,
        }
    }
}

/// Host and command allowlist/denylist checking.
#[derive(Debug)]
pub struct Filter {
    host_allowlist: Vec<HostMatcher>,
    host_denylist: Vec<HostMatcher>,
    cmd_allowlist: Vec<Regex>,
    cmd_denylist: Vec<Regex>,
}

impl Filter {
    /// Compile a new Filter from string patterns.
    pub fn new(
        host_allow: &[String],
        host_deny: &[String],
        cmd_allow: &[String],
        cmd_deny: &[String],
    ) -> Result<Self> {
        Ok(Filter {
            host_allowlist: compile_host_patterns(host_allow)
                .map_err(|e| SshMcpError::config(format!("host allowlist: {}", e)))?,
            host_denylist: compile_host_patterns(host_deny)
                .map_err(|e| SshMcpError::config(format!("host denylist: {}", e)))?,
            cmd_allowlist: compile_patterns(cmd_allow)
                .map_err(|e| SshMcpError::config(format!("command allowlist: {}", e)))?,
            cmd_denylist: compile_patterns(cmd_deny)
                .map_err(|e| SshMcpError::config(format!("command denylist: {}", e)))?,
        })
    }

    /// Check whether a host is allowed. Denylist has priority; an empty
    /// allowlist means allow-all. Matching is case-insensitive on the host.
    pub fn allow_host(&self, host: &str) -> Result<()> {
        let host = host.to_lowercase();

        for m in &self.host_denylist {
            if m.matches(&host) {
                return Err(SshMcpError::FilterDenied(format!(
                    "host {:?} is denied by denylist pattern {:?}",
                    host,
                    m.pattern()
                )));
            }
        }

        if !self.host_allowlist.is_empty() {
            if self.host_allowlist.iter().any(|m| m.matches(&host)) {
                return Ok(());
            }
            return Err(SshMcpError::FilterDenied(format!(
                "host {:?} is not in the allowlist",
                host
            )));
        }

        Ok(())
    }

    /// Check whether a command is allowed. Denylist has priority; an empty
    /// allowlist means allow-all. Matching is case-sensitive.
    pub fn allow_command(&self, cmd: &str) -> Result<()> {
        for re in &self.cmd_denylist {
            if re.is_match(cmd) {
                return Err(SshMcpError::FilterDenied(format!(
                    "command is denied by denylist pattern {:?}",
                    re.as_str()
                )));
            }
        }

        if !self.cmd_allowlist.is_empty() {
            if self.cmd_allowlist.iter().any(|re| re.is_match(cmd)) {
                return Ok(());
            }
            return Err(SshMcpError::FilterDenied(
                "command is not in the allowlist".to_string(),
            ));
        }

        Ok(())
    }
}

/// Compile host patterns: CIDR first, regex fallback. CIDR ranges are not
/// anchored; they are detected by containing `/` and parsing as a network.
fn compile_host_patterns(patterns: &[String]) -> Result<Vec<HostMatcher>> {
    let mut matchers = Vec::with_capacity(patterns.len());
    for p in patterns {
        if p.contains('/') {
            if let Ok(net) = p.parse::<IpNet>() {
                matchers.push(HostMatcher::Cidr {
                    net,
                    pattern: p.clone(),
                });
                continue;
            }
        }
        matchers.push(HostMatcher::Regex(compile_anchored_regex(p)?));
    }
    Ok(matchers)
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile_anchored_regex(p)).collect()
}

/// Compile a regex with `^`/`$` anchors added unless already present.
fn compile_anchored_regex(p: &str) -> Result<Regex> {
    let mut anchored = String::with_capacity(p.len() + 2);
    if !p.starts_with('^') {
        anchored.push('^');
    }
    anchored.push_str(p);
    if !p.ends_with('$') {
        anchored.push('$');
    }
    Regex::new(&anchored)
        .map_err(|e| SshMcpError::config(format!("invalid regex pattern {:?}: {}", p, e)))
}
