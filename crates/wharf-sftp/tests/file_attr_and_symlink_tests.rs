//! Attribute and symlink operation tests

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wharf_sftp::{AuditSink, ChannelSink, SftpSubsystem, SubsystemOptions, UserAccount};

#[derive(Clone, Default)]
struct CaptureSink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CaptureSink {
    fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.frames.lock().unwrap())
    }
}

#[async_trait]
impl ChannelSink for CaptureSink {
    async fn send(&mut self, data: &[u8]) -> wharf_sftp::Result<()> {
        self.frames.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> wharf_sftp::Result<()> {
        Ok(())
    }
}

fn subsystem(root: &Path, sink: &CaptureSink) -> SftpSubsystem {
    let account = UserAccount {
        username: "alice".to_string(),
        credential: "secret".to_string(),
        home_dir: root.to_path_buf(),
        enabled: true,
        can_upload: true,
        can_download: true,
        can_delete: true,
        can_create_dirs: true,
        max_upload_bytes: 0,
    };
    let options = SubsystemOptions {
        root_directory: root.to_path_buf(),
        enable_logging: false,
        session_id: "s000001".to_string(),
        username: "alice".to_string(),
        max_upload_bytes: 0,
        idle_timeout_secs: 0,
    };
    SftpSubsystem::new(options, account, Box::new(sink.clone()), AuditSink::disabled()).unwrap()
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

fn req_path_only(opcode: u8, id: u32, path: &str) -> Vec<u8> {
    let mut body = vec![opcode];
    body.extend_from_slice(&id.to_be_bytes());
    put_str(&mut body, path);
    frame(&body)
}

fn req_open(id: u32, path: &str, pflags: u32) -> Vec<u8> {
    let mut body = vec![3u8];
    body.extend_from_slice(&id.to_be_bytes());
    put_str(&mut body, path);
    body.extend_from_slice(&pflags.to_be_bytes());
    body.extend_from_slice(&0u32.to_be_bytes());
    frame(&body)
}

/// SETSTAT with an acmodtime pair only (flags 0x08).
fn req_setstat_times(id: u32, path: &str, atime: u32, mtime: u32) -> Vec<u8> {
    let mut body = vec![9u8];
    body.extend_from_slice(&id.to_be_bytes());
    put_str(&mut body, path);
    body.extend_from_slice(&0x08u32.to_be_bytes());
    body.extend_from_slice(&atime.to_be_bytes());
    body.extend_from_slice(&mtime.to_be_bytes());
    frame(&body)
}

fn payload(frame: &[u8]) -> &[u8] {
    &frame[4..]
}

fn be_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(buf[at..at + 4].try_into().unwrap())
}

fn status_code(frame_bytes: &[u8]) -> u32 {
    let body = payload(frame_bytes);
    assert_eq!(body[0], 101);
    be_u32(body, 5)
}

fn status_message(frame_bytes: &[u8]) -> String {
    let body = payload(frame_bytes);
    let len = be_u32(body, 9) as usize;
    String::from_utf8(body[13..13 + len].to_vec()).unwrap()
}

#[tokio::test]
async fn test_fstat_reports_current_size() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("f"), b"0123456789").unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    subsystem.input(&req_open(1, "/f", 0x01)).await.unwrap();
    let body = sink.take();
    let handle_body = payload(&body[0]);
    let len = be_u32(handle_body, 5) as usize;
    let handle = String::from_utf8(handle_body[9..9 + len].to_vec()).unwrap();

    let mut body = vec![8u8];
    body.extend_from_slice(&2u32.to_be_bytes());
    put_str(&mut body, &handle);
    subsystem.input(&frame(&body)).await.unwrap();

    let frames = sink.take();
    let attrs = payload(&frames[0]);
    assert_eq!(attrs[0], 105);
    assert_eq!(be_u32(attrs, 5), 0x0F);
    let size = u64::from_be_bytes(attrs[9..17].try_into().unwrap());
    assert_eq!(size, 10);
}

#[tokio::test]
async fn test_lstat_and_stat_agree() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("f"), b"abc").unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    subsystem.input(&req_path_only(17, 1, "/f")).await.unwrap();
    let stat = sink.take()[0].clone();
    subsystem.input(&req_path_only(7, 1, "/f")).await.unwrap();
    let lstat = sink.take()[0].clone();
    assert_eq!(stat, lstat);
}

#[tokio::test]
async fn test_setstat_applies_acmodtime() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("f");
    std::fs::write(&target, b"abc").unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    subsystem
        .input(&req_setstat_times(1, "/f", 1_500_000_000, 1_600_000_000))
        .await
        .unwrap();
    assert_eq!(status_code(&sink.take()[0]), 0);

    let metadata = std::fs::metadata(&target).unwrap();
    let mtime = metadata
        .modified()
        .unwrap()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    assert_eq!(mtime, 1_600_000_000);
}

#[tokio::test]
async fn test_setstat_on_missing_target_is_no_such_file() {
    let dir = TempDir::new().unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    subsystem
        .input(&req_setstat_times(1, "/missing", 1, 2))
        .await
        .unwrap();
    assert_eq!(status_code(&sink.take()[0]), 2);
}

#[tokio::test]
async fn test_setstat_ignores_size_uid_gid_permissions() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("f");
    std::fs::write(&target, b"abcdef").unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    // flags size|uidgid|permissions, no acmodtime.
    let mut body = vec![9u8];
    body.extend_from_slice(&1u32.to_be_bytes());
    put_str(&mut body, "/f");
    body.extend_from_slice(&0x07u32.to_be_bytes());
    body.extend_from_slice(&2u64.to_be_bytes()); // size
    body.extend_from_slice(&1234u32.to_be_bytes()); // uid
    body.extend_from_slice(&1234u32.to_be_bytes()); // gid
    body.extend_from_slice(&0o000u32.to_be_bytes()); // permissions
    subsystem.input(&frame(&body)).await.unwrap();

    assert_eq!(status_code(&sink.take()[0]), 0);
    // Nothing changed: the fields are parsed and discarded.
    let metadata = std::fs::metadata(&target).unwrap();
    assert_eq!(metadata.len(), 6);
    assert!(std::fs::read(&target).is_ok(), "file stays readable");
}

#[cfg(unix)]
#[tokio::test]
async fn test_readlink_on_regular_file_is_not_a_symlink() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("f"), b"abc").unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    subsystem.input(&req_path_only(19, 1, "/f")).await.unwrap();
    let frames = sink.take();
    assert_eq!(status_code(&frames[0]), 2);
    assert_eq!(status_message(&frames[0]), "Not a symbolic link");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_create_and_readlink() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("target.txt"), b"abc").unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    // SYMLINK linkpath=/link target=target.txt
    let mut body = vec![20u8];
    body.extend_from_slice(&1u32.to_be_bytes());
    put_str(&mut body, "/link");
    put_str(&mut body, "target.txt");
    subsystem.input(&frame(&body)).await.unwrap();
    assert_eq!(status_code(&sink.take()[0]), 0);
    assert!(dir.path().join("link").symlink_metadata().unwrap().file_type().is_symlink());

    // READLINK resolves and virtualizes the target.
    subsystem.input(&req_path_only(19, 2, "/link")).await.unwrap();
    let frames = sink.take();
    let body = payload(&frames[0]);
    assert_eq!(body[0], 104);
    assert_eq!(be_u32(body, 5), 1);
    let len = be_u32(body, 9) as usize;
    let name = String::from_utf8(body[13..13 + len].to_vec()).unwrap();
    assert_eq!(name, "/target.txt");
}

#[cfg(unix)]
#[tokio::test]
async fn test_readlink_clamps_escaping_targets() {
    let dir = TempDir::new().unwrap();
    let sink = CaptureSink::default();
    let mut subsystem = subsystem(dir.path(), &sink);

    // A link pointing outside the jail, created out-of-band.
    std::os::unix::fs::symlink("/etc/passwd", dir.path().join("escape")).unwrap();

    subsystem.input(&req_path_only(19, 1, "/escape")).await.unwrap();
    let frames = sink.take();
    let body = payload(&frames[0]);
    assert_eq!(body[0], 104);
    let len = be_u32(body, 9) as usize;
    let name = String::from_utf8(body[13..13 + len].to_vec()).unwrap();
    assert_eq!(name, "/", "targets outside the jail virtualize to the root");
}
