//! Session orchestrator: SSH server, authentication, subsystem spawn
//!
//! NIST 800-53: IA-2 (Identification and Authentication), AC-10
//! (Concurrent Session Control), AC-12 (Session Termination)
//! STIG: V-222601
//! Implementation: Accepts SSH connections, authenticates against the
//! user store, agrees only to `subsystem sftp`, and binds one
//! [`SftpSubsystem`] per channel to the user's home-directory jail.

use crate::audit::AuditSink;
use crate::config::Config;
use crate::subsystem::{ChannelSink, SftpSubsystem, SubsystemOptions};
use crate::users::{UserAccount, UserStore};
use crate::{Error, Result};
use async_trait::async_trait;
use russh::server::{Auth, Handler, Msg, Server as SshServer, Session};
use russh::{Channel, ChannelId, CryptoVec};
use russh_keys::key;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the per-session inbox between the SSH data callback and
/// the subsystem's run loop. Bounded so a stalled subsystem applies
/// backpressure to the channel instead of buffering without limit.
const SESSION_INBOX_CAPACITY: usize = 64;

/// SFTP server over SSH
pub struct Server {
    config: Arc<Config>,
    ssh_config: russh::server::Config,
    users: Arc<UserStore>,
    audit: AuditSink,
}

impl Server {
    /// Create a new server: validates the configuration, loads the user
    /// store and the host key (generating an ephemeral ed25519 key when
    /// none exists on disk).
    pub async fn new(config: Config, audit: AuditSink) -> Result<Self> {
        config.validate()?;

        let key_pair = load_host_key(&config.host_key_path).await?;
        let users = Arc::new(UserStore::load(&config.users_file)?);

        let ssh_config = russh::server::Config {
            auth_rejection_time: std::time::Duration::from_secs(3),
            auth_rejection_time_initial: Some(std::time::Duration::from_secs(0)),
            keys: vec![key_pair],
            ..Default::default()
        };

        Ok(Self {
            config: Arc::new(config),
            ssh_config,
            users,
            audit,
        })
    }

    /// Run the accept loop until the cancellation token fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        info!(
            event = "server_listening",
            address = %addr,
            max_connections = self.config.max_connections,
            "SFTP server listening"
        );

        let ssh_config = Arc::new(self.ssh_config);
        let mut server = SftpServer {
            config: self.config,
            users: self.users,
            audit: self.audit,
            active_connections: Arc::new(AtomicUsize::new(0)),
            session_counter: Arc::new(AtomicU64::new(1)),
        };

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(event = "server_shutdown", "Shutdown requested, stopping accept loop");
                Ok(())
            }
            result = server.run_on_address(ssh_config, &addr) => {
                result.map_err(|e| Error::Connection(format!("Server error: {}", e)))
            }
        }
    }
}

/// Factory handed to russh: one [`SessionHandler`] per accepted
/// connection, all sharing the store, the audit sink and the counter.
struct SftpServer {
    config: Arc<Config>,
    users: Arc<UserStore>,
    audit: AuditSink,
    active_connections: Arc<AtomicUsize>,
    session_counter: Arc<AtomicU64>,
}

#[async_trait]
impl SshServer for SftpServer {
    type Handler = SessionHandler;

    fn new_client(&mut self, peer_addr: Option<std::net::SocketAddr>) -> Self::Handler {
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        let at_capacity = active > self.config.max_connections;
        let session_id = format!(
            "s{:06}",
            self.session_counter.fetch_add(1, Ordering::SeqCst)
        );

        info!(
            event = "connection_accepted",
            session_id = %session_id,
            peer = ?peer_addr,
            active_connections = active,
            "New connection"
        );
        self.audit.connected(&session_id, "");

        if at_capacity {
            warn!(
                event = "connection_limit_reached",
                session_id = %session_id,
                active_connections = active,
                max_connections = self.config.max_connections,
                "Connection over capacity, authentication will be refused"
            );
        }

        SessionHandler {
            config: self.config.clone(),
            users: self.users.clone(),
            audit: self.audit.clone(),
            active_connections: self.active_connections.clone(),
            session_id,
            at_capacity,
            account: None,
            subsystem_tx: None,
            subsystem_started: false,
        }
    }
}

/// Per-connection handler: authentication, channel requests, data
/// forwarding into the subsystem's inbox.
pub struct SessionHandler {
    config: Arc<Config>,
    users: Arc<UserStore>,
    audit: AuditSink,
    active_connections: Arc<AtomicUsize>,
    session_id: String,
    at_capacity: bool,
    account: Option<UserAccount>,
    subsystem_tx: Option<mpsc::Sender<Vec<u8>>>,
    subsystem_started: bool,
}

#[async_trait]
impl Handler for SessionHandler {
    type Error = Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth> {
        if self.at_capacity {
            self.audit
                .connection_failed(&self.session_id, user, "Connection limit reached");
            return Ok(Auth::Reject {
                proceed_with_methods: None,
            });
        }

        if self.users.verify(user, password).await {
            match self.users.lookup(user).await {
                Some(account) => {
                    info!(
                        event = "auth_success",
                        session_id = %self.session_id,
                        username = user,
                        "Password authentication succeeded"
                    );
                    self.audit.auth_success(&self.session_id, user);
                    self.account = Some(account);
                    Ok(Auth::Accept)
                }
                None => Ok(Auth::Reject {
                    proceed_with_methods: None,
                }),
            }
        } else {
            warn!(
                event = "auth_failure",
                session_id = %self.session_id,
                username = user,
                "Password authentication failed"
            );
            self.audit
                .auth_failed(&self.session_id, user, "Invalid credentials");
            Ok(Auth::Reject {
                proceed_with_methods: Some(russh::MethodSet::PASSWORD),
            })
        }
    }

    async fn auth_publickey(&mut self, _user: &str, _public_key: &key::PublicKey) -> Result<Auth> {
        // Accounts carry password credentials only.
        Ok(Auth::Reject {
            proceed_with_methods: Some(russh::MethodSet::PASSWORD),
        })
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool> {
        debug!(
            event = "channel_opened",
            session_id = %self.session_id,
            "Session channel opened"
        );
        Ok(true)
    }

    async fn subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<()> {
        let handle = session.handle();

        if name != "sftp" {
            warn!(
                event = "subsystem_refused",
                session_id = %self.session_id,
                subsystem = name,
                "Unsupported subsystem"
            );
            let _ = handle.channel_failure(channel_id).await;
            return Ok(());
        }

        let Some(account) = self.account.clone() else {
            let _ = handle.channel_failure(channel_id).await;
            return Ok(());
        };

        let options = SubsystemOptions {
            root_directory: self.config.resolve_home(&account.home_dir),
            enable_logging: self.config.verbose,
            session_id: self.session_id.clone(),
            username: account.username.clone(),
            max_upload_bytes: self.config.max_upload_bytes,
            idle_timeout_secs: self.config.idle_timeout_secs,
        };

        let sink = Box::new(RusshChannelSink {
            handle: handle.clone(),
            channel: channel_id,
        });
        let subsystem = SftpSubsystem::new(options, account, sink, self.audit.clone())?;

        let (tx, rx) = mpsc::channel(SESSION_INBOX_CAPACITY);
        self.subsystem_tx = Some(tx);
        self.subsystem_started = true;
        tokio::spawn(subsystem.run(rx));

        handle
            .channel_success(channel_id)
            .await
            .map_err(|_| Error::ChannelClosed("Failed to confirm subsystem".into()))?;

        info!(
            event = "sftp_subsystem_started",
            session_id = %self.session_id,
            "SFTP subsystem started"
        );
        Ok(())
    }

    async fn shell_request(&mut self, channel_id: ChannelId, session: &mut Session) -> Result<()> {
        warn!(
            event = "shell_refused",
            session_id = %self.session_id,
            "Shell requests are not served"
        );
        let _ = session.handle().channel_failure(channel_id).await;
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel_id: ChannelId,
        _data: &[u8],
        session: &mut Session,
    ) -> Result<()> {
        warn!(
            event = "exec_refused",
            session_id = %self.session_id,
            "Exec requests are not served"
        );
        let _ = session.handle().channel_failure(channel_id).await;
        Ok(())
    }

    async fn data(
        &mut self,
        _channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<()> {
        // Forward in arrival order; the subsystem serializes processing.
        if let Some(tx) = &self.subsystem_tx {
            if tx.send(data.to_vec()).await.is_err() {
                debug!(
                    event = "subsystem_gone",
                    session_id = %self.session_id,
                    "Subsystem ended, discarding channel data"
                );
                self.subsystem_tx = None;
            }
        }
        Ok(())
    }

    async fn channel_eof(&mut self, _channel: ChannelId, _session: &mut Session) -> Result<()> {
        // Dropping the sender ends the subsystem's run loop.
        self.subsystem_tx = None;
        Ok(())
    }

    async fn channel_close(&mut self, _channel: ChannelId, _session: &mut Session) -> Result<()> {
        self.subsystem_tx = None;
        Ok(())
    }
}

impl Drop for SessionHandler {
    fn drop(&mut self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
        self.subsystem_tx = None;
        // A running subsystem audits its own disconnect on teardown.
        if !self.subsystem_started {
            let username = self
                .account
                .as_ref()
                .map(|a| a.username.as_str())
                .unwrap_or("");
            self.audit.disconnected(&self.session_id, username);
        }
    }
}

/// The subsystem's outbound half, backed by the russh session handle.
struct RusshChannelSink {
    handle: russh::server::Handle,
    channel: ChannelId,
}

#[async_trait]
impl ChannelSink for RusshChannelSink {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.handle
            .data(self.channel, CryptoVec::from_slice(data))
            .await
            .map_err(|_| Error::ChannelClosed("Failed to send response".into()))
    }

    async fn close(&mut self) -> Result<()> {
        self.handle
            .close(self.channel)
            .await
            .map_err(|_| Error::ChannelClosed("Failed to close channel".into()))
    }
}

async fn load_host_key(path: &Path) -> Result<key::KeyPair> {
    if !path.exists() {
        warn!(
            event = "host_key_missing",
            path = ?path,
            "Host key not found, generating ephemeral ed25519 key"
        );
        return key::KeyPair::generate_ed25519()
            .ok_or_else(|| Error::Config("Failed to generate host key".into()));
    }

    let key_data = fs::read_to_string(path).await?;
    russh_keys::decode_secret_key(&key_data, None)
        .map_err(|e| Error::Config(format!("Failed to load host key: {}", e)))
}
