//! Packet framing and session lifecycle tests
//!
//! Framing must be split-invariant: however the request byte stream is
//! chunked, the produced responses are identical. The run loop must
//! release handles and audit the disconnect on every exit path.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wharf_sftp::{AuditSink, ChannelSink, IdleState, SftpSubsystem, SubsystemOptions, UserAccount};

#[derive(Clone, Default)]
struct CaptureSink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<Mutex<bool>>,
}

impl CaptureSink {
    fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }

    fn closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl ChannelSink for CaptureSink {
    async fn send(&mut self, data: &[u8]) -> wharf_sftp::Result<()> {
        self.frames.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> wharf_sftp::Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

fn account(root: &Path) -> UserAccount {
    UserAccount {
        username: "alice".to_string(),
        credential: "secret".to_string(),
        home_dir: root.to_path_buf(),
        enabled: true,
        can_upload: true,
        can_download: true,
        can_delete: true,
        can_create_dirs: true,
        max_upload_bytes: 0,
    }
}

fn options(root: &Path, idle_timeout_secs: u64) -> SubsystemOptions {
    SubsystemOptions {
        root_directory: root.to_path_buf(),
        enable_logging: false,
        session_id: "s000001".to_string(),
        username: "alice".to_string(),
        max_upload_bytes: 0,
        idle_timeout_secs,
    }
}

fn frame(body: &[u8]) -> Vec<u8> {
    let mut out = (body.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// INIT, REALPATH ".", OPENDIR "/", READDIR, READDIR (EOF), CLOSE.
fn scripted_stream() -> Vec<u8> {
    let mut stream = Vec::new();

    let mut body = vec![1u8];
    body.extend_from_slice(&3u32.to_be_bytes());
    stream.extend(frame(&body));

    let mut body = vec![16u8];
    body.extend_from_slice(&1u32.to_be_bytes());
    put_str(&mut body, ".");
    stream.extend(frame(&body));

    let mut body = vec![11u8];
    body.extend_from_slice(&2u32.to_be_bytes());
    put_str(&mut body, "/");
    stream.extend(frame(&body));

    for id in [3u32, 4] {
        let mut body = vec![12u8];
        body.extend_from_slice(&id.to_be_bytes());
        put_str(&mut body, "1");
        stream.extend(frame(&body));
    }

    let mut body = vec![4u8];
    body.extend_from_slice(&5u32.to_be_bytes());
    put_str(&mut body, "1");
    stream.extend(frame(&body));

    stream
}

async fn responses_for_chunking(root: &Path, stream: &[u8], chunk_len: usize) -> Vec<Vec<u8>> {
    let sink = CaptureSink::default();
    let mut subsystem = SftpSubsystem::new(
        options(root, 0),
        account(root),
        Box::new(sink.clone()),
        AuditSink::disabled(),
    )
    .unwrap();

    for chunk in stream.chunks(chunk_len) {
        subsystem.input(chunk).await.unwrap();
    }
    sink.frames()
}

#[tokio::test]
async fn test_framing_is_split_invariant() {
    let dir = TempDir::new().unwrap();
    let stream = scripted_stream();

    let whole = responses_for_chunking(dir.path(), &stream, stream.len()).await;
    assert_eq!(whole.len(), 6, "one response per request");

    for chunk_len in [1, 2, 3, 5, 7, 16, 64] {
        let split = responses_for_chunking(dir.path(), &stream, chunk_len).await;
        assert_eq!(
            split, whole,
            "responses must not depend on a chunk size of {}",
            chunk_len
        );
    }
}

#[tokio::test]
async fn test_partial_packet_stays_buffered() {
    let dir = TempDir::new().unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = SftpSubsystem::new(
        options(dir.path(), 0),
        account(dir.path()),
        Box::new(sink.clone()),
        AuditSink::disabled(),
    )
    .unwrap();

    let init = frame(&{
        let mut body = vec![1u8];
        body.extend_from_slice(&3u32.to_be_bytes());
        body
    });

    // Everything but the last byte: no response yet.
    subsystem.input(&init[..init.len() - 1]).await.unwrap();
    assert!(sink.frames().is_empty());

    // The final byte completes the packet.
    subsystem.input(&init[init.len() - 1..]).await.unwrap();
    assert_eq!(sink.frames().len(), 1);
}

#[tokio::test]
async fn test_two_packets_in_one_chunk() {
    let dir = TempDir::new().unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = SftpSubsystem::new(
        options(dir.path(), 0),
        account(dir.path()),
        Box::new(sink.clone()),
        AuditSink::disabled(),
    )
    .unwrap();

    let mut combined = Vec::new();
    let mut body = vec![1u8];
    body.extend_from_slice(&3u32.to_be_bytes());
    combined.extend(frame(&body));
    let mut body = vec![16u8];
    body.extend_from_slice(&1u32.to_be_bytes());
    put_str(&mut body, "/");
    combined.extend(frame(&body));

    subsystem.input(&combined).await.unwrap();
    let frames = sink.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0][4], 2); // VERSION
    assert_eq!(frames[1][4], 104); // NAME
}

#[tokio::test]
async fn test_run_loop_teardown_audits_disconnect() {
    let dir = TempDir::new().unwrap();
    let audit_dir = TempDir::new().unwrap();
    let log = audit_dir.path().join("audit.log");
    let (audit, writer) = AuditSink::spawn(log.clone());

    let sink = CaptureSink::default();
    let subsystem = SftpSubsystem::new(
        options(dir.path(), 0),
        account(dir.path()),
        Box::new(sink.clone()),
        audit.clone(),
    )
    .unwrap();

    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(subsystem.run(rx));

    // OPENDIR leaves a handle open; the teardown must still release it.
    let mut body = vec![11u8];
    body.extend_from_slice(&1u32.to_be_bytes());
    put_str(&mut body, "/");
    tx.send(frame(&body)).await.unwrap();

    // Remote close: dropping the sender ends the run loop.
    drop(tx);
    task.await.unwrap();

    drop(audit);
    writer.await.unwrap();

    let content = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert!(lines.iter().any(|l| l.contains("|DIR_LIST|/|")));
    assert!(
        lines.last().unwrap().contains("|s000001|alice|DISCONNECTED|"),
        "teardown emits the disconnect audit last: {:?}",
        lines
    );
}

#[tokio::test]
async fn test_idle_timeout_closes_the_channel() {
    let dir = TempDir::new().unwrap();
    let sink = CaptureSink::default();
    let subsystem = SftpSubsystem::new(
        options(dir.path(), 1),
        account(dir.path()),
        Box::new(sink.clone()),
        AuditSink::disabled(),
    )
    .unwrap();

    let (tx, rx) = mpsc::channel::<Vec<u8>>(8);
    let task = tokio::spawn(subsystem.run(rx));

    // No inbound bytes: the 1s window elapses and the subsystem asks the
    // transport to close.
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("idle expiry must end the run loop")
        .unwrap();
    assert!(sink.closed());
    drop(tx);
}

#[tokio::test]
async fn test_inbound_bytes_keep_the_session_active() {
    let dir = TempDir::new().unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = SftpSubsystem::new(
        options(dir.path(), 60),
        account(dir.path()),
        Box::new(sink.clone()),
        AuditSink::disabled(),
    )
    .unwrap();

    assert_eq!(subsystem.idle_state(), IdleState::Active);
    subsystem.input(&[0x00]).await.unwrap();
    assert_eq!(subsystem.idle_state(), IdleState::Active);
}
