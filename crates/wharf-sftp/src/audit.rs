//! Audit trail
//!
//! NIST 800-53: AU-2 (Audit Events), AU-3 (Content of Audit Records),
//! AU-12 (Audit Generation)
//! STIG: V-222648 (Audit Records)
//! Implementation: Fire-and-forget audit events flow through a bounded
//! queue into a single writer task appending pipe-delimited lines to the
//! audit log. Producers never block: events past capacity are dropped so
//! the per-session serialization discipline is preserved.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Queue capacity between producers and the writer task.
pub const AUDIT_QUEUE_CAPACITY: usize = 1000;

/// The fixed set of audit action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Connected,
    ConnectionFailed,
    Disconnected,
    AuthSuccess,
    AuthFailed,
    FileRead,
    FileWrite,
    FileDelete,
    DirCreate,
    DirDelete,
    DirList,
    Rename,
    Error,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Connected => "CONNECTED",
            AuditAction::ConnectionFailed => "CONNECTION_FAILED",
            AuditAction::Disconnected => "DISCONNECTED",
            AuditAction::AuthSuccess => "AUTH_SUCCESS",
            AuditAction::AuthFailed => "AUTH_FAILED",
            AuditAction::FileRead => "FILE_READ",
            AuditAction::FileWrite => "FILE_WRITE",
            AuditAction::FileDelete => "FILE_DELETE",
            AuditAction::DirCreate => "DIR_CREATE",
            AuditAction::DirDelete => "DIR_DELETE",
            AuditAction::DirList => "DIR_LIST",
            AuditAction::Rename => "RENAME",
            AuditAction::Error => "ERROR",
        }
    }
}

/// One audit record, ordered per session in emission order.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub username: String,
    pub action: AuditAction,
    pub target: Option<String>,
    pub details: Option<String>,
}

impl AuditEvent {
    pub fn new(
        session_id: impl Into<String>,
        username: impl Into<String>,
        action: AuditAction,
        target: Option<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            username: username.into(),
            action,
            target,
            details,
        }
    }

    /// On-disk line:
    /// `YYYY-MM-DD HH:MM:SS.mmm|<sessionId>|<username>|<ACTION>|<target|->|<details|->`
    pub fn format_line(&self) -> String {
        let dash = |s: &Option<String>| match s.as_deref() {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => "-".to_string(),
        };
        fn field(s: &str) -> &str {
            if s.is_empty() {
                "-"
            } else {
                s
            }
        }
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            field(&self.session_id),
            field(&self.username),
            self.action.as_str(),
            dash(&self.target),
            dash(&self.details),
        )
    }

    /// Export as JSON for SIEM ingestion
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Structured trace emission alongside the on-disk trail.
    fn log(&self) {
        info!(
            event = "audit",
            action = self.action.as_str(),
            session_id = %self.session_id,
            username = %self.username,
            target = self.target.as_deref().unwrap_or("-"),
            details = self.details.as_deref().unwrap_or("-"),
            timestamp = %self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }
}

/// Cloneable producer handle onto the audit queue.
///
/// All emit methods are fire-and-forget; a full queue drops the event
/// rather than blocking the caller.
#[derive(Debug, Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditSink {
    /// Spawn the writer task appending to `path` and return the producer
    /// handle. The task drains the queue and exits once every producer
    /// handle is dropped; await the join handle for a clean flush.
    pub fn spawn(path: PathBuf) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(AUDIT_QUEUE_CAPACITY);
        let writer = tokio::spawn(write_loop(path, rx));
        (Self { tx }, writer)
    }

    /// A sink with no writer behind it; every emit is a silent no-op.
    /// Used by tests and when auditing is disabled.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    pub fn emit(&self, event: AuditEvent) {
        event.log();
        // Capacity overflow and writer shutdown both drop the event.
        let _ = self.tx.try_send(event);
    }

    pub fn connected(&self, session_id: &str, username: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::Connected,
            None,
            None,
        ));
    }

    pub fn connection_failed(&self, session_id: &str, username: &str, details: impl Into<String>) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::ConnectionFailed,
            None,
            Some(details.into()),
        ));
    }

    pub fn disconnected(&self, session_id: &str, username: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::Disconnected,
            None,
            None,
        ));
    }

    pub fn auth_success(&self, session_id: &str, username: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::AuthSuccess,
            None,
            None,
        ));
    }

    pub fn auth_failed(&self, session_id: &str, username: &str, details: impl Into<String>) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::AuthFailed,
            None,
            Some(details.into()),
        ));
    }

    pub fn file_read(&self, session_id: &str, username: &str, target: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::FileRead,
            Some(target.to_string()),
            None,
        ));
    }

    pub fn file_write(&self, session_id: &str, username: &str, target: &str, details: String) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::FileWrite,
            Some(target.to_string()),
            Some(details),
        ));
    }

    pub fn file_delete(&self, session_id: &str, username: &str, target: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::FileDelete,
            Some(target.to_string()),
            None,
        ));
    }

    pub fn dir_create(&self, session_id: &str, username: &str, target: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::DirCreate,
            Some(target.to_string()),
            None,
        ));
    }

    pub fn dir_delete(&self, session_id: &str, username: &str, target: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::DirDelete,
            Some(target.to_string()),
            None,
        ));
    }

    pub fn dir_list(&self, session_id: &str, username: &str, target: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::DirList,
            Some(target.to_string()),
            None,
        ));
    }

    pub fn rename(&self, session_id: &str, username: &str, old: &str, new: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::Rename,
            Some(format!("{} -> {}", old, new)),
            None,
        ));
    }

    pub fn error(&self, session_id: &str, username: &str, operation: &str, message: &str) {
        self.emit(AuditEvent::new(
            session_id,
            username,
            AuditAction::Error,
            Some(operation.to_string()),
            Some(message.to_string()),
        ));
    }
}

/// The single writer: opens the log in append mode and drains the queue
/// until every producer is gone. Write failures are traced, never fatal.
async fn write_loop(path: PathBuf, mut rx: mpsc::Receiver<AuditEvent>) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
    }

    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(f) => f,
        Err(e) => {
            warn!(
                event = "audit_log_unavailable",
                path = ?path,
                error = %e,
                "Failed to open audit log, discarding audit events"
            );
            while rx.recv().await.is_some() {}
            return;
        }
    };

    while let Some(event) = rx.recv().await {
        let line = event.format_line();
        if let Err(e) = file.write_all(format!("{}\n", line).as_bytes()).await {
            warn!(
                event = "audit_write_failed",
                error = %e,
                "Failed to append audit record"
            );
        }
    }
    let _ = file.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_format() {
        let mut event = AuditEvent::new(
            "s000042",
            "alice",
            AuditAction::FileWrite,
            Some("/reports/q3.csv".to_string()),
            Some("512 bytes at offset 0".to_string()),
        );
        event.timestamp = Utc.with_ymd_and_hms(2025, 3, 9, 14, 30, 5).unwrap()
            + chrono::Duration::milliseconds(7);

        assert_eq!(
            event.format_line(),
            "2025-03-09 14:30:05.007|s000042|alice|FILE_WRITE|/reports/q3.csv|512 bytes at offset 0"
        );
    }

    #[test]
    fn test_missing_fields_render_as_dash() {
        let mut event = AuditEvent::new("s1", "", AuditAction::Connected, None, None);
        event.timestamp = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(
            event.format_line(),
            "2025-01-01 00:00:00.000|s1|-|CONNECTED|-|-"
        );
    }

    #[test]
    fn test_json_export() {
        let event = AuditEvent::new(
            "s1",
            "alice",
            AuditAction::AuthSuccess,
            None,
            None,
        );
        let json = event.to_json().unwrap();
        assert!(json.contains("\"AUTH_SUCCESS\""));
        assert!(json.contains("\"alice\""));
    }

    #[test]
    fn test_action_tags() {
        assert_eq!(AuditAction::ConnectionFailed.as_str(), "CONNECTION_FAILED");
        assert_eq!(AuditAction::AuthSuccess.as_str(), "AUTH_SUCCESS");
        assert_eq!(AuditAction::DirList.as_str(), "DIR_LIST");
        assert_eq!(AuditAction::Error.as_str(), "ERROR");
    }

    #[tokio::test]
    async fn test_writer_appends_in_emission_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("audit.log");
        let (sink, writer) = AuditSink::spawn(log.clone());

        sink.connected("s1", "alice");
        sink.dir_list("s1", "alice", "/");
        sink.disconnected("s1", "alice");
        drop(sink);
        writer.await.unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("|CONNECTED|"));
        assert!(lines[1].contains("|DIR_LIST|/|"));
        assert!(lines[2].contains("|DISCONNECTED|"));
    }

    #[tokio::test]
    async fn test_disabled_sink_is_a_no_op() {
        let sink = AuditSink::disabled();
        // No writer behind the queue; emits must not panic or block.
        for _ in 0..10 {
            sink.error("s1", "alice", "OPEN", "boom");
        }
    }
}
