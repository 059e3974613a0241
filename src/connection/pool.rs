//! SSH connection pool
//!
//! Sessions are deduplicated by `user@host:port`. A connect installs a
//! *reservation* (a session whose ready signal is still open) in the map
//! before dialing, so concurrent callers for the same identity coalesce onto
//! one dial and concurrent `get` calls wait instead of failing with "session
//! not found". The dial itself runs in a spawned task: a caller dropped
//! mid-connect frees itself immediately while the reservation still resolves,
//! and the ready signal fires exactly once on every terminating path.
//!
//! Locking: the pool map lock and the per-session state lock are both held
//! only for short sections; dials and probes happen outside the pool lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use russh::client::{self, Handle, Msg};
use russh::keys::{HashAlg, PrivateKeyWithHashAlg};
use russh::{Channel, Disconnect};
use secrecy::ExposeSecret;
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::auth::{AuthDiscovery, AuthMethod, ClientSettings, ConnectParams};
use super::handler::ClientHandler;
use super::probe::{self, RemoteInfo};
use super::session_id;
use crate::config::SshSettings;
use crate::error::{Result, SshMcpError};

/// How often the idle scan runs.
const IDLE_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Budget for the liveness probe (a channel-open round trip).
const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata about one session, as reported by `ssh_list_sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub command_count: u64,
    pub connected: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub arch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shell: String,
}

#[derive(Default)]
struct SessionState {
    handle: Option<Handle<ClientHandler>>,
    /// Retained for auto-reconnect; holds bound auth methods, not raw secrets.
    settings: Option<Arc<ClientSettings>>,
    connect_err: Option<String>,
    connected: bool,
    connected_at: Option<DateTime<Utc>>,
    last_used: Option<DateTime<Utc>>,
    command_count: u64,
    remote: RemoteInfo,
}

/// One resident SSH transport plus its pool bookkeeping.
pub struct Session {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a pending session: ready signal open, no transport yet.
    fn reservation(id: &str, host: &str, port: u16, user: &str) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            id: id.to_string(),
            host: host.to_string(),
            port,
            user: user.to_string(),
            ready_tx,
            ready_rx,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Whether the initial connect attempt has finished (either way).
    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Wait until the connect attempt finishes. Dropping the future is the
    /// cancellation path; the in-flight dial keeps running.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        // The sender lives on this session, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Close the ready signal. Idempotent by construction, and every
    /// terminating connect path goes through here exactly once.
    fn mark_ready(&self) {
        let _ = self.ready_tx.send(true);
    }

    async fn connect_error(&self) -> Option<String> {
        self.state.lock().await.connect_err.clone()
    }

    /// Bump `last_used`.
    pub async fn touch(&self) {
        self.state.lock().await.last_used = Some(Utc::now());
    }

    /// Count one executed command.
    pub async fn increment_command_count(&self) {
        self.state.lock().await.command_count += 1;
    }

    /// Detected remote OS/arch/shell (may be empty).
    pub async fn remote_info(&self) -> RemoteInfo {
        self.state.lock().await.remote.clone()
    }

    /// Probe the transport by opening (and immediately closing) a channel.
    /// The russh client has no hook for arbitrary global requests, so this
    /// round trip stands in for `keepalive@openssh.com`.
    pub async fn is_alive(&self) -> bool {
        let state = self.state.lock().await;
        if !state.connected {
            return false;
        }
        let Some(handle) = state.handle.as_ref() else {
            return false;
        };
        match timeout(LIVENESS_TIMEOUT, handle.channel_open_session()).await {
            Ok(Ok(channel)) => {
                let _ = channel.close().await;
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }

    /// Open a fresh channel on the resident transport.
    pub async fn open_channel(&self) -> Result<Channel<Msg>> {
        let state = self.state.lock().await;
        let handle = state
            .handle
            .as_ref()
            .ok_or_else(|| SshMcpError::ConnectionFailed {
                id: self.id.clone(),
                reason: "SSH connection not established".to_string(),
            })?;
        let channel = handle.channel_open_session().await?;
        Ok(channel)
    }

    async fn saved_settings(&self) -> Option<Arc<ClientSettings>> {
        self.state.lock().await.settings.clone()
    }

    async fn install_handle(&self, handle: Handle<ClientHandler>) {
        let mut state = self.state.lock().await;
        state.handle = Some(handle);
        state.connected = true;
        state.last_used = Some(Utc::now());
    }

    /// Mark disconnected and tear down the transport, if any.
    async fn close_transport(&self) {
        let mut state = self.state.lock().await;
        state.connected = false;
        if let Some(handle) = state.handle.take() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await;
        }
    }

    /// Snapshot for listings. A still-pending session reports bare identity
    /// with `connected = false`.
    pub async fn info(&self) -> SessionInfo {
        if !self.is_ready() {
            return SessionInfo {
                session_id: self.id.clone(),
                host: self.host.clone(),
                port: self.port,
                user: self.user.clone(),
                connected_at: None,
                last_used: None,
                command_count: 0,
                connected: false,
                os: String::new(),
                arch: String::new(),
                shell: String::new(),
            };
        }

        let state = self.state.lock().await;
        SessionInfo {
            session_id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            connected_at: state.connected_at,
            last_used: state.last_used,
            command_count: state.command_count,
            connected: state.connected,
            os: state.remote.os.clone(),
            arch: state.remote.arch.clone(),
            shell: state.remote.shell.clone(),
        }
    }
}

/// Pool of SSH sessions keyed by `user@host:port`.
pub struct Pool {
    conns: RwLock<HashMap<String, Arc<Session>>>,
    auth: Arc<AuthDiscovery>,
    cfg: SshSettings,
    client_config: Arc<client::Config>,
}

impl Pool {
    pub fn new(cfg: SshSettings, auth: Arc<AuthDiscovery>) -> Self {
        let client_config = client::Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            keepalive_interval: Some(Duration::from_secs(60)),
            keepalive_max: 3,
            ..Default::default()
        };
        Self {
            conns: RwLock::new(HashMap::new()),
            auth,
            cfg,
            client_config: Arc::new(client_config),
        }
    }

    /// Establish or reuse a session, returning its id.
    pub async fn connect(self: &Arc<Self>, params: &ConnectParams) -> Result<String> {
        let id = session_id(&params.user, &params.host, params.port);

        // Existing entry (alive, dead, failed, or pending): wait for it and
        // either reuse it or clear it out.
        let existing = self.conns.read().await.get(&id).cloned();
        if let Some(existing) = existing {
            existing.wait_ready().await;
            if existing.connect_error().await.is_some() {
                self.remove_if_same(&id, &existing).await;
            } else if existing.is_alive().await {
                existing.touch().await;
                return Ok(id);
            } else {
                self.remove_if_same(&id, &existing).await;
                existing.close_transport().await;
            }
        }

        let settings = Arc::new(self.auth.build_client_settings(params)?);
        let pending = Arc::new(Session::reservation(
            &id,
            &params.host,
            params.port,
            &params.user,
        ));

        // Install the reservation, handling the pool cap and a lost race
        // against a concurrent reservation for the same identity.
        let raced = {
            let mut conns = self.conns.write().await;

            let max = self.cfg.max_connections;
            if max > 0 && conns.len() >= max && !conns.contains_key(&id) {
                pending.mark_ready(); // signal so no one waits forever
                return Err(SshMcpError::config(format!(
                    "connection pool is full (max {} connections)",
                    max
                )));
            }

            match conns.get(&id).cloned() {
                None => {
                    conns.insert(id.clone(), Arc::clone(&pending));
                    None
                }
                Some(raced) => Some(raced),
            }
        };

        if let Some(raced) = raced {
            // Another caller reserved this identity while we built the
            // settings. Adopt its outcome when usable.
            raced.wait_ready().await;
            if raced.connect_error().await.is_none() && raced.is_alive().await {
                raced.touch().await;
                pending.mark_ready();
                return Ok(id);
            }

            let mut conns = self.conns.write().await;
            let still_raced = conns.get(&id).map(|current| Arc::ptr_eq(current, &raced));
            match still_raced {
                Some(true) => {
                    conns.remove(&id);
                    conns.insert(id.clone(), Arc::clone(&pending));
                }
                Some(false) => {
                    // Yet another caller got in; give up and let ours retry.
                    drop(conns);
                    pending.mark_ready();
                    return Err(SshMcpError::ConnectionFailed {
                        id,
                        reason: "concurrent connection attempt, please retry".to_string(),
                    });
                }
                None => {
                    conns.insert(id.clone(), Arc::clone(&pending));
                }
            }
            drop(conns);
            raced.close_transport().await;
        }

        // Dial in a spawned task so waiter cancellation cannot strand the
        // reservation.
        {
            let pool = Arc::clone(self);
            let id = id.clone();
            let pending = Arc::clone(&pending);
            let settings = Arc::clone(&settings);
            tokio::spawn(async move {
                pool.run_dial(id, pending, settings).await;
            });
        }

        pending.wait_ready().await;
        if let Some(reason) = pending.connect_error().await {
            return Err(SshMcpError::Dial {
                addr: settings.addr.clone(),
                reason,
            });
        }
        Ok(id)
    }

    /// Complete a reservation: dial, authenticate, probe, publish.
    async fn run_dial(
        self: Arc<Self>,
        id: String,
        pending: Arc<Session>,
        settings: Arc<ClientSettings>,
    ) {
        match self.dial(&settings).await {
            Ok(handle) => {
                let remote = probe::detect_remote_info(&handle).await;
                if !remote.is_empty() {
                    debug!("remote info for {}: {}", id, remote.summary());
                }
                let now = Utc::now();
                {
                    let mut state = pending.state.lock().await;
                    state.handle = Some(handle);
                    state.connected = true;
                    state.connected_at = Some(now);
                    state.last_used = Some(now);
                    state.settings = Some(settings);
                    state.remote = remote;
                }
                pending.mark_ready();
                info!("connected to {}", id);
            }
            Err(e) => {
                error!("connection to {} failed: {}", id, e);
                pending.state.lock().await.connect_err = Some(e.to_string());
                // Remove the reservation, but only if it is still ours.
                let mut conns = self.conns.write().await;
                let still_ours = conns
                    .get(&id)
                    .is_some_and(|current| Arc::ptr_eq(current, &pending));
                if still_ours {
                    conns.remove(&id);
                }
                drop(conns);
                pending.mark_ready();
            }
        }
    }

    /// Dial and authenticate, trying the bound methods in discovery order.
    async fn dial(&self, settings: &ClientSettings) -> Result<Handle<ClientHandler>> {
        let handler = ClientHandler::new(
            settings.host.clone(),
            settings.port,
            settings.verify.clone(),
        );

        let connect = client::connect(
            Arc::clone(&self.client_config),
            settings.addr.as_str(),
            handler,
        );
        let mut handle = match timeout(self.cfg.connection_timeout, connect).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                return Err(SshMcpError::Dial {
                    addr: settings.addr.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(SshMcpError::Dial {
                    addr: settings.addr.clone(),
                    reason: format!(
                        "connection timeout after {}s",
                        self.cfg.connection_timeout.as_secs()
                    ),
                });
            }
        };

        for method in &settings.methods {
            match method {
                AuthMethod::Key(key) => {
                    let hash_alg = if key.algorithm().is_rsa() {
                        Some(HashAlg::Sha512)
                    } else {
                        None
                    };
                    let key = PrivateKeyWithHashAlg::new(Arc::clone(key), hash_alg);
                    match handle.authenticate_publickey(&settings.user, key).await {
                        Ok(result) if result.success() => return Ok(handle),
                        Ok(_) => debug!("public key rejected for {}", settings.user),
                        Err(e) => debug!("public key auth error: {}", e),
                    }
                }
                AuthMethod::Password(password) => {
                    match handle
                        .authenticate_password(&settings.user, password.expose_secret())
                        .await
                    {
                        Ok(result) if result.success() => return Ok(handle),
                        Ok(_) => debug!("password rejected for {}", settings.user),
                        Err(e) => debug!("password auth error: {}", e),
                    }
                }
            }
        }

        Err(SshMcpError::Dial {
            addr: settings.addr.clone(),
            reason: "all authentication methods rejected".to_string(),
        })
    }

    /// Look up a session without waiting or liveness checking.
    pub async fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.conns.read().await.get(id).cloned()
    }

    /// Retrieve a session by id, reconnecting in place when it is dead.
    pub async fn get(&self, id: &str) -> Result<Arc<Session>> {
        let session = self
            .conns
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SshMcpError::SessionNotFound(id.to_string()))?;

        session.wait_ready().await;

        if let Some(reason) = session.connect_error().await {
            return Err(SshMcpError::ConnectionFailed {
                id: id.to_string(),
                reason,
            });
        }

        if session.is_alive().await {
            session.touch().await;
            return Ok(session);
        }

        // Auto-reconnect from the retained settings; no raw credentials
        // are needed because the methods are already bound.
        warn!("connection {} lost, attempting reconnect...", id);
        session.close_transport().await;

        let settings =
            session
                .saved_settings()
                .await
                .ok_or_else(|| SshMcpError::ReconnectFailed {
                    id: id.to_string(),
                    reason: "no saved client settings".to_string(),
                })?;

        let handle = self
            .dial(&settings)
            .await
            .map_err(|e| SshMcpError::ReconnectFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        session.install_handle(handle).await;
        info!("reconnected to {}", id);
        Ok(session)
    }

    /// Close and remove a session. A pending dial is waited out first so the
    /// close cannot race it.
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        let session = self
            .conns
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SshMcpError::SessionNotFound(id.to_string()))?;

        session.wait_ready().await;
        session.close_transport().await;
        Ok(())
    }

    /// Info for every session. Pending sessions are included with
    /// `connected = false`.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<_> = self.conns.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos
    }

    /// Close every session. Used at process shutdown.
    pub async fn close_all(&self) {
        let sessions: Vec<_> = {
            let mut conns = self.conns.write().await;
            conns.drain().map(|(_, s)| s).collect()
        };
        for session in sessions {
            session.wait_ready().await;
            session.close_transport().await;
        }
    }

    /// Spawn the periodic idle-session scan.
    pub fn start_idle_cleanup(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(IDLE_SCAN_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                pool.cleanup_idle().await;
            }
        });
    }

    async fn cleanup_idle(&self) {
        let max_idle = match chrono::Duration::from_std(self.cfg.max_idle_time) {
            Ok(d) => d,
            Err(_) => return,
        };
        let now = Utc::now();

        // Collect candidates outside the pool write path.
        let sessions: Vec<_> = self.conns.read().await.values().cloned().collect();
        let mut stale = Vec::new();
        for session in sessions {
            // Pending sessions are never collected.
            if !session.is_ready() {
                continue;
            }
            let state = session.state.lock().await;
            if state.connected {
                if let Some(last_used) = state.last_used {
                    if now - last_used > max_idle {
                        stale.push(session.id.clone());
                    }
                }
            }
        }

        for id in stale {
            info!("closing idle connection: {}", id);
            let _ = self.disconnect(&id).await;
        }
    }

    async fn remove_if_same(&self, id: &str, session: &Arc<Session>) {
        let mut conns = self.conns.write().await;
        let same = conns
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if same {
            conns.remove(id);
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.conns.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_settings() -> SshSettings {
        SshSettings {
            known_hosts_path: PathBuf::from("/nonexistent/known_hosts"),
            verify_host_key: false,
            ssh_config_path: PathBuf::from("/nonexistent/config"),
            key_search_paths: vec![PathBuf::from("/nonexistent/id_ed25519")],
            command_timeout: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(5),
            max_idle_time: Duration::from_secs(300),
            allow_sudo: false,
            strip_ansi: true,
            max_connections: 0,
        }
    }

    fn test_pool(cfg: SshSettings) -> Arc<Pool> {
        let auth = Arc::new(AuthDiscovery::new(cfg.clone()));
        Arc::new(Pool::new(cfg, auth))
    }

    fn ready_session(id: &str, host: &str, port: u16, user: &str) -> Arc<Session> {
        let session = Arc::new(Session::reservation(id, host, port, user));
        session.mark_ready();
        session
    }

    #[tokio::test]
    async fn test_list_empty() {
        let pool = test_pool(test_settings());
        assert!(pool.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_not_found() {
        let pool = test_pool(test_settings());
        let err = pool.disconnect("nobody@nowhere:22").await.unwrap_err();
        assert!(matches!(err, SshMcpError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let pool = test_pool(test_settings());
        let err = pool.get("nobody@nowhere:22").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_close_all_empty() {
        let pool = test_pool(test_settings());
        pool.close_all().await;
    }

    #[tokio::test]
    async fn test_connect_without_auth_methods_leaves_pool_empty() {
        let pool = test_pool(test_settings());
        let params = ConnectParams {
            host: "example.com".into(),
            port: 22,
            user: "alice".into(),
            ..Default::default()
        };
        let err = pool.connect(&params).await.unwrap_err();
        assert!(matches!(err, SshMcpError::AuthConfig(_)));
        assert_eq!(pool.len().await, 0);
    }

    #[tokio::test]
    async fn test_connect_refused_cleans_reservation() {
        let pool = test_pool(test_settings());
        let params = ConnectParams {
            host: "127.0.0.1".into(),
            port: 1, // nothing listens here
            user: "alice".into(),
            password: Some("pw".into()),
            ..Default::default()
        };
        let err = pool.connect(&params).await.unwrap_err();
        assert!(matches!(err, SshMcpError::Dial { .. }));
        // Failed reservations never remain in the pool.
        assert_eq!(pool.len().await, 0);
        assert!(pool.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_pool_cap_rejects_new_identity() {
        let mut cfg = test_settings();
        cfg.max_connections = 1;
        let pool = test_pool(cfg);

        let occupied = ready_session("bob@other:22", "other", 22, "bob");
        pool.conns
            .write()
            .await
            .insert(occupied.id.clone(), occupied);

        let params = ConnectParams {
            host: "example.com".into(),
            port: 22,
            user: "alice".into(),
            password: Some("pw".into()),
            ..Default::default()
        };
        let err = pool.connect(&params).await.unwrap_err();
        assert!(err.to_string().contains("pool is full"));
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_waits_for_pending_connect() {
        let pool = test_pool(test_settings());
        let id = "alice@example.com:22";
        let pending = Arc::new(Session::reservation(id, "example.com", 22, "alice"));
        pool.conns
            .write()
            .await
            .insert(id.to_string(), Arc::clone(&pending));

        let pool2 = Arc::clone(&pool);
        let waiter = tokio::spawn(async move { pool2.get(id).await });

        // The waiter must still be blocked on the ready signal.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        // Simulate a connect that finished without a transport: the waiter
        // unblocks and fails on reconnect, but never with "not found".
        pending.state.lock().await.connected = true;
        pending.mark_ready();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("get did not return after ready")
            .unwrap();
        let err = result.unwrap_err();
        assert!(!err.to_string().contains("not found"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_get_pending_connect_failure() {
        let pool = test_pool(test_settings());
        let id = "alice@fail.example.com:22";
        let pending = Arc::new(Session::reservation(id, "fail.example.com", 22, "alice"));
        pending.state.lock().await.connect_err = Some("dial refused".to_string());
        pending.mark_ready();
        pool.conns
            .write()
            .await
            .insert(id.to_string(), Arc::clone(&pending));

        let err = pool.get(id).await.unwrap_err();
        match err {
            SshMcpError::ConnectionFailed { id: got, reason } => {
                assert_eq!(got, id);
                assert!(reason.contains("dial refused"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_list_reports_pending_as_disconnected() {
        let pool = test_pool(test_settings());
        let pending = Arc::new(Session::reservation(
            "alice@example.com:22",
            "example.com",
            22,
            "alice",
        ));
        pool.conns
            .write()
            .await
            .insert(pending.id.clone(), pending);

        let infos = pool.list().await;
        assert_eq!(infos.len(), 1);
        assert!(!infos[0].connected);
        assert_eq!(infos[0].session_id, "alice@example.com:22");
        assert_eq!(infos[0].command_count, 0);
    }

    #[tokio::test]
    async fn test_session_id_matches_identity_fields() {
        let session = ready_session("alice@example.com:2222", "example.com", 2222, "alice");
        let info = session.info().await;
        assert_eq!(
            info.session_id,
            format!("{}@{}:{}", info.user, info.host, info.port)
        );
    }

    #[tokio::test]
    async fn test_increment_command_count() {
        let session = ready_session("a@b:22", "b", 22, "a");
        session.increment_command_count().await;
        session.increment_command_count().await;
        session.increment_command_count().await;
        assert_eq!(session.info().await.command_count, 3);
    }

    #[tokio::test]
    async fn test_disconnect_removes_entry() {
        let pool = test_pool(test_settings());
        let session = ready_session("a@b:22", "b", 22, "a");
        pool.conns
            .write()
            .await
            .insert(session.id.clone(), session);

        pool.disconnect("a@b:22").await.unwrap();
        assert_eq!(pool.len().await, 0);
        assert!(pool.disconnect("a@b:22").await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_idle_skips_pending_and_fresh() {
        let pool = test_pool(test_settings());

        let pending = Arc::new(Session::reservation("p@h:22", "h", 22, "p"));
        pool.conns
            .write()
            .await
            .insert(pending.id.clone(), Arc::clone(&pending));

        let fresh = ready_session("f@h:22", "h", 22, "f");
        {
            let mut state = fresh.state.lock().await;
            state.connected = true;
            state.last_used = Some(Utc::now());
        }
        pool.conns
            .write()
            .await
            .insert(fresh.id.clone(), Arc::clone(&fresh));

        pool.cleanup_idle().await;
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn test_cleanup_idle_evicts_stale() {
        let pool = test_pool(test_settings());
        let stale = ready_session("s@h:22", "h", 22, "s");
        {
            let mut state = stale.state.lock().await;
            state.connected = true;
            state.last_used = Some(Utc::now() - chrono::Duration::seconds(3600));
        }
        pool.conns
            .write()
            .await
            .insert(stale.id.clone(), Arc::clone(&stale));

        pool.cleanup_idle().await;
        assert_eq!(pool.len().await, 0);
    }
}
