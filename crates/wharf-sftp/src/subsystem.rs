//! SFTP subsystem: one protocol engine per authenticated channel
//!
//! NIST 800-53: AC-3 (Access Enforcement), AC-12 (Session Termination),
//! SI-10 (Input Validation), SI-11 (Error Handling)
//! STIG: V-222566, V-222596, V-222601
//! Implementation: Reassembles length-prefixed SFTP packets from the
//! channel byte stream, dispatches the draft-02 request opcodes against
//! the user's jail, and emits exactly one response per request. Request
//! processing is serialized; no request-level error ever terminates the
//! subsystem.

use crate::audit::AuditSink;
use crate::handles::{Access, FileHandle, HandleTable};
use crate::jail::PathJail;
use crate::protocol::{
    codec, format_longname, Disposition, FileAttrs, MessageType, OpenFlags, StatusCode,
    SFTP_VERSION,
};
use crate::users::UserAccount;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::{Buf, BufMut, BytesMut};
use filetime::FileTime;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Upper bound on a single DATA response; longer READ requests are
/// answered with a short read, which clients retry at the next offset.
const MAX_READ_LEN: u32 = 262_144;

/// Outbound half of the transport channel, implemented by the SSH layer
/// and by test harnesses.
#[async_trait]
pub trait ChannelSink: Send {
    /// Send bytes to the peer. Delivery is ordered and reliable.
    async fn send(&mut self, data: &[u8]) -> Result<()>;
    /// Ask the transport to close the channel.
    async fn close(&mut self) -> Result<()>;
}

/// Construction options for one subsystem instance.
#[derive(Debug, Clone)]
pub struct SubsystemOptions {
    /// Jail root; created if absent
    pub root_directory: PathBuf,
    /// Per-packet debug trace
    pub enable_logging: bool,
    /// Tag on every audit event from this session
    pub session_id: String,
    /// Tag on every audit event from this session
    pub username: String,
    /// Server-wide upload ceiling; 0 means unlimited
    pub max_upload_bytes: u64,
    /// Seconds of inactivity before the channel is closed; 0 disables
    pub idle_timeout_secs: u64,
}

/// Idle state of the channel, re-evaluated on every timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    /// Last inbound byte arrived within the window
    Active,
    /// The window elapsed with no inbound bytes
    Expired,
}

/// One SFTP protocol engine bound to one SSH channel.
pub struct SftpSubsystem {
    options: SubsystemOptions,
    user: UserAccount,
    jail: PathJail,
    handles: HandleTable,
    inbox: BytesMut,
    sink: Box<dyn ChannelSink>,
    audit: AuditSink,
    last_activity: Instant,
}

impl SftpSubsystem {
    pub fn new(
        options: SubsystemOptions,
        user: UserAccount,
        sink: Box<dyn ChannelSink>,
        audit: AuditSink,
    ) -> Result<Self> {
        let jail = PathJail::new(&options.root_directory)?;
        Ok(Self {
            options,
            user,
            jail,
            handles: HandleTable::new(),
            inbox: BytesMut::new(),
            sink,
            audit,
            last_activity: Instant::now(),
        })
    }

    /// The jail this subsystem resolves paths against.
    pub fn jail(&self) -> &PathJail {
        &self.jail
    }

    /// Number of currently open file and directory handles.
    pub fn open_handles(&self) -> usize {
        self.handles.open_count()
    }

    /// Current idle state against the configured window.
    pub fn idle_state(&self) -> IdleState {
        let window = self.options.idle_timeout_secs;
        if window > 0 && self.last_activity.elapsed() >= Duration::from_secs(window) {
            IdleState::Expired
        } else {
            IdleState::Active
        }
    }

    /// Single-consumer run loop: inbound chunks arrive through `inbound`
    /// in channel order; an idle ticker fires at the timeout period.
    /// Every exit path releases all handles and audits the disconnect.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Vec<u8>>) {
        let window = self.options.idle_timeout_secs;
        if window == 0 {
            while let Some(chunk) = inbound.recv().await {
                if self.input(&chunk).await.is_err() {
                    break;
                }
            }
        } else {
            let mut ticker = tokio::time::interval(Duration::from_secs(window));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    chunk = inbound.recv() => match chunk {
                        Some(chunk) => {
                            if self.input(&chunk).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if self.idle_state() == IdleState::Expired {
                            info!(
                                event = "session_idle_timeout",
                                session_id = %self.options.session_id,
                                idle_secs = window,
                                "Closing channel after idle timeout"
                            );
                            let _ = self.sink.close().await;
                            break;
                        }
                    }
                }
            }
        }
        self.teardown().await;
    }

    /// Feed one inbound chunk: stamp activity, append to the
    /// accumulator, and dispatch every complete packet
    /// (`u32 length || body`). Partial packets stay buffered.
    pub async fn input(&mut self, chunk: &[u8]) -> Result<()> {
        self.last_activity = Instant::now();
        self.inbox.extend_from_slice(chunk);

        loop {
            if self.inbox.len() < 4 {
                break;
            }
            let len = u32::from_be_bytes([
                self.inbox[0],
                self.inbox[1],
                self.inbox[2],
                self.inbox[3],
            ]) as usize;
            if self.inbox.len() < 4 + len {
                break;
            }
            self.inbox.advance(4);
            let packet = self.inbox.split_to(len);
            self.dispatch(&packet).await?;
        }
        Ok(())
    }

    /// Dispatch a single packet: first byte is the opcode, the rest is
    /// its payload. Exactly one response is sent for every request whose
    /// request id parses; the rest are dropped.
    async fn dispatch(&mut self, packet: &[u8]) -> Result<()> {
        let Some((&opcode, mut payload)) = packet.split_first() else {
            // Zero-length frame: nothing to answer.
            return Ok(());
        };

        if self.options.enable_logging {
            debug!(
                event = "sftp_request",
                session_id = %self.options.session_id,
                opcode = MessageType::name(opcode),
                len = packet.len(),
                "Dispatching SFTP request"
            );
        }

        if opcode == MessageType::Init as u8 {
            let client_version = codec::get_u32(&mut payload).unwrap_or(0);
            debug!(
                event = "sftp_init",
                session_id = %self.options.session_id,
                client_version,
                "Negotiated SFTP version 3"
            );
            let mut response = BytesMut::new();
            response.put_u8(MessageType::Version as u8);
            response.put_u32(SFTP_VERSION);
            return self.send(&response).await;
        }

        // Without a parseable request id there is nothing to correlate a
        // response to; the packet is dropped.
        let Ok(request_id) = codec::get_u32(&mut payload) else {
            warn!(
                event = "sftp_unanswerable_packet",
                opcode = MessageType::name(opcode),
                "Dropping packet without a parseable request id"
            );
            return Ok(());
        };

        let result = match opcode {
            3 => self.op_open(request_id, payload).await,
            4 => self.op_close(request_id, payload).await,
            5 => self.op_read(request_id, payload).await,
            6 => self.op_write(request_id, payload).await,
            7 | 17 => self.op_stat(request_id, payload).await,
            8 => self.op_fstat(request_id, payload).await,
            9 => self.op_setstat(request_id, payload).await,
            10 => self.op_fsetstat(request_id, payload).await,
            11 => self.op_opendir(request_id, payload).await,
            12 => self.op_readdir(request_id, payload).await,
            13 => self.op_remove(request_id, payload).await,
            14 => self.op_mkdir(request_id, payload).await,
            15 => self.op_rmdir(request_id, payload).await,
            16 => self.op_realpath(request_id, payload).await,
            18 => self.op_rename(request_id, payload).await,
            19 => self.op_readlink(request_id, payload).await,
            20 => self.op_symlink(request_id, payload).await,
            other => Err(Error::NotSupported(format!("opcode {}", other))),
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.audit.error(
                    &self.options.session_id,
                    &self.options.username,
                    MessageType::name(opcode),
                    &err.to_string(),
                );
                status_response(request_id, err.to_status_code(), &err.to_string())
            }
        };
        self.send(&response).await
    }

    async fn op_open(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;
        let pflags = codec::get_u32(&mut buf)?;
        let _attrs = FileAttrs::decode(&mut buf)?;
        let flags = OpenFlags(pflags);

        // Capability gates come before any filesystem access, so a
        // denied create never leaves a file behind.
        if flags.wants_write() && !self.user.can_upload {
            return Err(Error::PermissionDenied("Upload not allowed".into()));
        }
        if flags.wants_read() && !self.user.can_download {
            return Err(Error::PermissionDenied("Download not allowed".into()));
        }

        let physical = self.jail.to_physical(&path);
        let access = Access::from_flags(&flags);
        let disposition = flags.disposition();

        let mut options = fs::OpenOptions::new();
        if access.readable() {
            options.read(true);
        }
        if access.writable() {
            options.write(true);
        }
        match disposition {
            Disposition::Truncate => {
                options.create(true).truncate(true);
            }
            Disposition::Create => {
                options.create(true);
            }
            Disposition::Append => {
                options.create(true).append(true);
            }
            Disposition::OpenExisting => {}
        }
        if flags.has_excl() {
            options.create_new(true);
        }

        let file = options.open(&physical).await?;

        if access.readable() {
            let virtual_path = self.jail.to_virtual(&physical);
            self.audit.file_read(
                &self.options.session_id,
                &self.options.username,
                &virtual_path,
            );
        }

        let handle = self.handles.insert_file(FileHandle {
            file,
            path: physical,
            access,
            disposition,
        });
        Ok(handle_response(id, &HandleTable::wire(handle)))
    }

    async fn op_close(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let wire = codec::get_bytes(&mut buf)?;
        let handle = HandleTable::parse_wire(&wire).ok_or(Error::InvalidHandle)?;
        if !self.handles.release(handle) {
            return Err(Error::InvalidHandle);
        }
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    async fn op_read(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let wire = codec::get_bytes(&mut buf)?;
        let offset = codec::get_u64(&mut buf)?;
        let len = codec::get_u32(&mut buf)?;

        let handle = HandleTable::parse_wire(&wire).ok_or(Error::InvalidHandle)?;
        let file_handle = self.handles.file_mut(handle).ok_or(Error::InvalidHandle)?;

        file_handle
            .file
            .seek(std::io::SeekFrom::Start(offset))
            .await?;

        let mut buffer = vec![0u8; len.min(MAX_READ_LEN) as usize];
        let n = file_handle.file.read(&mut buffer).await?;
        if n == 0 {
            return Ok(status_response(id, StatusCode::Eof as u32, "End of file"));
        }
        buffer.truncate(n);
        Ok(data_response(id, &buffer))
    }

    async fn op_write(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let wire = codec::get_bytes(&mut buf)?;
        let offset = codec::get_u64(&mut buf)?;
        let data = codec::get_bytes(&mut buf)?;

        let ceiling = effective_ceiling(self.options.max_upload_bytes, self.user.max_upload_bytes);
        let handle = HandleTable::parse_wire(&wire).ok_or(Error::InvalidHandle)?;
        let file_handle = self.handles.file_mut(handle).ok_or(Error::InvalidHandle)?;

        // Ceiling check before any byte lands: the projected size is the
        // write's end offset or the current size, whichever is larger.
        if ceiling > 0 {
            let current = file_handle.file.metadata().await?.len();
            let target = offset.saturating_add(data.len() as u64).max(current);
            if target > ceiling {
                return Err(Error::UploadLimitExceeded);
            }
        }

        file_handle
            .file
            .seek(std::io::SeekFrom::Start(offset))
            .await?;
        file_handle.file.write_all(&data).await?;

        let virtual_path = self.jail.to_virtual(&file_handle.path);
        self.audit.file_write(
            &self.options.session_id,
            &self.options.username,
            &virtual_path,
            format!("{} bytes at offset {}", data.len(), offset),
        );
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    /// STAT and LSTAT share an implementation: both follow symlinks.
    async fn op_stat(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;
        let physical = self.jail.to_physical(&path);
        let metadata = fs::metadata(&physical)
            .await
            .map_err(|_| Error::FileNotFound(path))?;
        Ok(attrs_response(id, &FileAttrs::from_metadata(&metadata)))
    }

    async fn op_fstat(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let wire = codec::get_bytes(&mut buf)?;
        let handle = HandleTable::parse_wire(&wire).ok_or(Error::InvalidHandle)?;
        let file_handle = self.handles.file(handle).ok_or(Error::InvalidHandle)?;
        let metadata = file_handle.file.metadata().await?;
        Ok(attrs_response(id, &FileAttrs::from_metadata(&metadata)))
    }

    async fn op_setstat(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;
        let attrs = FileAttrs::decode(&mut buf)?;

        if !self.user.can_upload {
            return Err(Error::PermissionDenied("Upload not allowed".into()));
        }

        let physical = self.jail.to_physical(&path);
        if fs::metadata(&physical).await.is_err() {
            return Err(Error::FileNotFound(path));
        }
        apply_times(&physical, &attrs)?;
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    async fn op_fsetstat(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let wire = codec::get_bytes(&mut buf)?;
        let attrs = FileAttrs::decode(&mut buf)?;

        if !self.user.can_upload {
            return Err(Error::PermissionDenied("Upload not allowed".into()));
        }

        let handle = HandleTable::parse_wire(&wire).ok_or(Error::InvalidHandle)?;
        let path = self
            .handles
            .file(handle)
            .ok_or(Error::InvalidHandle)?
            .path
            .clone();
        apply_times(&path, &attrs)?;
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    async fn op_opendir(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;
        let physical = self.jail.to_physical(&path);

        let metadata = fs::metadata(&physical)
            .await
            .map_err(|_| Error::FileNotFound(path.clone()))?;
        if !metadata.is_dir() {
            return Err(Error::FileNotFound(path));
        }

        let virtual_path = self.jail.to_virtual(&physical);
        self.audit.dir_list(
            &self.options.session_id,
            &self.options.username,
            &virtual_path,
        );

        let handle = self.handles.insert_dir(physical);
        Ok(handle_response(id, &HandleTable::wire(handle)))
    }

    async fn op_readdir(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let wire = codec::get_bytes(&mut buf)?;
        let handle = HandleTable::parse_wire(&wire).ok_or(Error::InvalidHandle)?;

        let path = {
            let dir_handle = self.handles.dir_mut(handle).ok_or(Error::InvalidHandle)?;
            if dir_handle.yielded {
                return Ok(status_response(
                    id,
                    StatusCode::Eof as u32,
                    "End of directory",
                ));
            }
            dir_handle.yielded = true;
            dir_handle.path.clone()
        };

        // The full listing goes out in one NAME packet; the next READDIR
        // on this handle reports EOF.
        let mut entries: Vec<(String, std::fs::Metadata)> = Vec::new();
        let mut read_dir = fs::read_dir(&path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if let Ok(metadata) = entry.metadata().await {
                entries.push((entry.file_name().to_string_lossy().into_owned(), metadata));
            }
        }

        let mut response = BytesMut::new();
        response.put_u8(MessageType::Name as u8);
        response.put_u32(id);
        response.put_u32(entries.len() as u32);
        for (name, metadata) in &entries {
            let attrs = FileAttrs::from_metadata(metadata);
            let longname = format_longname(
                name,
                metadata.is_dir(),
                metadata.len(),
                attrs.mtime.unwrap_or(0),
            );
            codec::put_string(&mut response, name);
            codec::put_string(&mut response, &longname);
            response.put(attrs.encode());
        }
        Ok(response)
    }

    async fn op_remove(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;

        if !self.user.can_delete {
            return Err(Error::PermissionDenied("Delete not allowed".into()));
        }

        let physical = self.jail.to_physical(&path);
        fs::remove_file(&physical).await?;

        let virtual_path = self.jail.to_virtual(&physical);
        self.audit.file_delete(
            &self.options.session_id,
            &self.options.username,
            &virtual_path,
        );
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    async fn op_mkdir(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;
        let _attrs = FileAttrs::decode(&mut buf)?;

        if !self.user.can_create_dirs {
            return Err(Error::PermissionDenied("Create directory not allowed".into()));
        }

        let physical = self.jail.to_physical(&path);
        // Intermediate directories are permitted.
        fs::create_dir_all(&physical).await?;

        let virtual_path = self.jail.to_virtual(&physical);
        self.audit.dir_create(
            &self.options.session_id,
            &self.options.username,
            &virtual_path,
        );
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    async fn op_rmdir(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;

        if !self.user.can_delete {
            return Err(Error::PermissionDenied("Delete not allowed".into()));
        }

        let physical = self.jail.to_physical(&path);
        fs::remove_dir(&physical).await?;

        let virtual_path = self.jail.to_virtual(&physical);
        self.audit.dir_delete(
            &self.options.session_id,
            &self.options.username,
            &virtual_path,
        );
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    async fn op_realpath(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;
        let physical = self.jail.to_physical(&path);
        let virtual_path = self.jail.to_virtual(&physical);
        Ok(name_response_single(id, &virtual_path))
    }

    async fn op_rename(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let old = codec::get_string(&mut buf)?;
        let new = codec::get_string(&mut buf)?;

        if !(self.user.can_upload && self.user.can_delete) {
            return Err(Error::PermissionDenied("Rename not allowed".into()));
        }

        let old_physical = self.jail.to_physical(&old);
        let new_physical = self.jail.to_physical(&new);

        if fs::metadata(&old_physical).await.is_err() {
            return Err(Error::FileNotFound(old));
        }
        fs::rename(&old_physical, &new_physical).await?;

        self.audit.rename(
            &self.options.session_id,
            &self.options.username,
            &self.jail.to_virtual(&old_physical),
            &self.jail.to_virtual(&new_physical),
        );
        Ok(status_response(id, StatusCode::Ok as u32, "Success"))
    }

    async fn op_readlink(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let path = codec::get_string(&mut buf)?;
        let physical = self.jail.to_physical(&path);

        let metadata = fs::symlink_metadata(&physical)
            .await
            .map_err(|_| Error::FileNotFound(path.clone()))?;
        if !metadata.file_type().is_symlink() {
            return Ok(status_response(
                id,
                StatusCode::NoSuchFile as u32,
                "Not a symbolic link",
            ));
        }

        let target = fs::read_link(&physical).await?;
        let absolute = if target.is_absolute() {
            target
        } else {
            match physical.parent() {
                Some(parent) => parent.join(&target),
                None => target,
            }
        };
        let virtual_path = self.jail.to_virtual(&self.jail.clamp(&absolute));
        Ok(name_response_single(id, &virtual_path))
    }

    async fn op_symlink(&mut self, id: u32, mut buf: &[u8]) -> Result<BytesMut> {
        let linkpath = codec::get_string(&mut buf)?;
        let target = codec::get_string(&mut buf)?;

        if !self.user.can_upload {
            return Err(Error::PermissionDenied("Upload not allowed".into()));
        }

        let link_physical = self.jail.to_physical(&linkpath);
        // Absolute targets are pinned inside the jail; relative targets
        // pass through and resolve against the link's directory.
        let target_path = if target.starts_with('/') {
            self.jail.to_physical(&target)
        } else {
            PathBuf::from(&target)
        };

        match create_symlink(&target_path, &link_physical).await {
            Ok(()) => Ok(status_response(id, StatusCode::Ok as u32, "Success")),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Ok(status_response(
                id,
                StatusCode::PermissionDenied as u32,
                "Symbolic links require administrator privileges",
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let mut framed = BytesMut::with_capacity(payload.len() + 4);
        framed.put_u32(payload.len() as u32);
        framed.put_slice(payload);
        self.sink.send(&framed).await
    }

    async fn teardown(&mut self) {
        let open = self.handles.open_count();
        if open > 0 {
            debug!(
                event = "session_handle_cleanup",
                session_id = %self.options.session_id,
                open_handles = open,
                "Releasing open handles on session end"
            );
        }
        self.handles.clear();
        self.audit
            .disconnected(&self.options.session_id, &self.options.username);
    }
}

/// Smallest nonzero of the per-subsystem and per-user ceilings;
/// 0 means unlimited.
fn effective_ceiling(subsystem: u64, user: u64) -> u64 {
    match (subsystem, user) {
        (0, u) => u,
        (s, 0) => s,
        (s, u) => s.min(u),
    }
}

/// SETSTAT/FSETSTAT apply only the acmodtime pair; size, uid/gid and
/// permission bits are parsed and ignored.
fn apply_times(path: &std::path::Path, attrs: &FileAttrs) -> Result<()> {
    if let (Some(atime), Some(mtime)) = (attrs.atime, attrs.mtime) {
        filetime::set_file_times(
            path,
            FileTime::from_unix_time(atime as i64, 0),
            FileTime::from_unix_time(mtime as i64, 0),
        )?;
    }
    Ok(())
}

#[cfg(unix)]
async fn create_symlink(target: &std::path::Path, link: &std::path::Path) -> std::io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(not(unix))]
async fn create_symlink(_target: &std::path::Path, _link: &std::path::Path) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
}

fn status_response(id: u32, code: u32, message: &str) -> BytesMut {
    let mut response = BytesMut::new();
    response.put_u8(MessageType::Status as u8);
    response.put_u32(id);
    response.put_u32(code);
    codec::put_string(&mut response, message);
    codec::put_string(&mut response, ""); // empty language tag
    response
}

fn handle_response(id: u32, handle: &str) -> BytesMut {
    let mut response = BytesMut::new();
    response.put_u8(MessageType::Handle as u8);
    response.put_u32(id);
    codec::put_string(&mut response, handle);
    response
}

fn data_response(id: u32, data: &[u8]) -> BytesMut {
    let mut response = BytesMut::new();
    response.put_u8(MessageType::Data as u8);
    response.put_u32(id);
    codec::put_bytes(&mut response, data);
    response
}

fn attrs_response(id: u32, attrs: &FileAttrs) -> BytesMut {
    let mut response = BytesMut::new();
    response.put_u8(MessageType::Attrs as u8);
    response.put_u32(id);
    response.put(attrs.encode());
    response
}

/// NAME response with one entry and a dummy attrs block (REALPATH,
/// READLINK).
fn name_response_single(id: u32, name: &str) -> BytesMut {
    let mut response = BytesMut::new();
    response.put_u8(MessageType::Name as u8);
    response.put_u32(id);
    response.put_u32(1);
    codec::put_string(&mut response, name);
    codec::put_string(&mut response, name);
    response.put(FileAttrs::default().encode());
    response
}
