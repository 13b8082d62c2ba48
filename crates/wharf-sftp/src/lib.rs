//! # Wharf SFTP
//!
//! Multi-user SFTP server speaking protocol version 3
//! (draft-ietf-secsh-filexfer-02) inside authenticated SSH session
//! channels.
//!
//! Every session runs one [`subsystem::SftpSubsystem`] jailed to the
//! user's home directory. The subsystem reassembles length-prefixed
//! packets from the channel byte stream, dispatches the twenty request
//! opcodes, and enforces per-user capabilities, upload ceilings, path
//! containment and idle timeouts while feeding an append-only audit
//! trail.
//!
//! ## Features
//!
//! - Full SFTP v3 protocol support
//! - Async/await with Tokio over russh
//! - Per-user jails with transparent traversal clamping
//! - Capability gates (upload, download, delete, create-directory)
//! - Upload size ceilings, idle timeouts, connection caps
//! - Pipe-delimited audit trail with a bounded, non-blocking writer

pub mod audit;
pub mod config;
pub mod error;
pub mod handles;
pub mod jail;
pub mod protocol;
pub mod server;
pub mod subsystem;
pub mod users;

pub use audit::{AuditAction, AuditEvent, AuditSink};
pub use config::{Config, LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use jail::PathJail;
pub use server::Server;
pub use subsystem::{ChannelSink, IdleState, SftpSubsystem, SubsystemOptions};
pub use users::{UserAccount, UserStore};
