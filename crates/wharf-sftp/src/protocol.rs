//! SFTP wire protocol
//!
//! Implements the packet grammar of draft-ietf-secsh-filexfer-02: all
//! multi-byte integers big-endian, all strings `uint32 length || UTF-8`
//! with no terminator, attribute blocks gated by a flags bitset.
//!
//! The SFTP protocol runs over the SSH connection protocol (RFC 4254),
//! using the "sftp" subsystem.

use bytes::{Buf, BufMut, BytesMut};
use chrono::{TimeZone, Utc};

/// SFTP protocol version spoken by this server, regardless of the
/// version the client advertises in INIT.
pub const SFTP_VERSION: u32 = 3;

/// SFTP message types (as defined in the SFTP specification)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Initialize SFTP session
    Init = 1,
    /// Version response
    Version = 2,
    /// Open file
    Open = 3,
    /// Close file or directory handle
    Close = 4,
    /// Read from file
    Read = 5,
    /// Write to file
    Write = 6,
    /// Get file attributes by path (do not follow symlinks)
    Lstat = 7,
    /// Get file attributes by handle
    Fstat = 8,
    /// Set file attributes by path
    Setstat = 9,
    /// Set file attributes by handle
    Fsetstat = 10,
    /// Open directory
    Opendir = 11,
    /// Read directory entries
    Readdir = 12,
    /// Remove file
    Remove = 13,
    /// Create directory
    Mkdir = 14,
    /// Remove directory
    Rmdir = 15,
    /// Canonicalize path
    Realpath = 16,
    /// Get file attributes by path (follow symlinks)
    Stat = 17,
    /// Rename file or directory
    Rename = 18,
    /// Read symbolic link target
    Readlink = 19,
    /// Create symbolic link
    Symlink = 20,
    /// Status response
    Status = 101,
    /// Handle response
    Handle = 102,
    /// Data response
    Data = 103,
    /// Name response (directory listings, realpath, readlink)
    Name = 104,
    /// Attributes response
    Attrs = 105,
}

impl TryFrom<u8> for MessageType {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Init),
            2 => Ok(MessageType::Version),
            3 => Ok(MessageType::Open),
            4 => Ok(MessageType::Close),
            5 => Ok(MessageType::Read),
            6 => Ok(MessageType::Write),
            7 => Ok(MessageType::Lstat),
            8 => Ok(MessageType::Fstat),
            9 => Ok(MessageType::Setstat),
            10 => Ok(MessageType::Fsetstat),
            11 => Ok(MessageType::Opendir),
            12 => Ok(MessageType::Readdir),
            13 => Ok(MessageType::Remove),
            14 => Ok(MessageType::Mkdir),
            15 => Ok(MessageType::Rmdir),
            16 => Ok(MessageType::Realpath),
            17 => Ok(MessageType::Stat),
            18 => Ok(MessageType::Rename),
            19 => Ok(MessageType::Readlink),
            20 => Ok(MessageType::Symlink),
            101 => Ok(MessageType::Status),
            102 => Ok(MessageType::Handle),
            103 => Ok(MessageType::Data),
            104 => Ok(MessageType::Name),
            105 => Ok(MessageType::Attrs),
            _ => Err(crate::Error::Protocol(format!(
                "Unknown message type: {}",
                value
            ))),
        }
    }
}

impl MessageType {
    /// Opcode name for audit records and trace output.
    pub fn name(opcode: u8) -> &'static str {
        match MessageType::try_from(opcode) {
            Ok(MessageType::Init) => "INIT",
            Ok(MessageType::Version) => "VERSION",
            Ok(MessageType::Open) => "OPEN",
            Ok(MessageType::Close) => "CLOSE",
            Ok(MessageType::Read) => "READ",
            Ok(MessageType::Write) => "WRITE",
            Ok(MessageType::Lstat) => "LSTAT",
            Ok(MessageType::Fstat) => "FSTAT",
            Ok(MessageType::Setstat) => "SETSTAT",
            Ok(MessageType::Fsetstat) => "FSETSTAT",
            Ok(MessageType::Opendir) => "OPENDIR",
            Ok(MessageType::Readdir) => "READDIR",
            Ok(MessageType::Remove) => "REMOVE",
            Ok(MessageType::Mkdir) => "MKDIR",
            Ok(MessageType::Rmdir) => "RMDIR",
            Ok(MessageType::Realpath) => "REALPATH",
            Ok(MessageType::Stat) => "STAT",
            Ok(MessageType::Rename) => "RENAME",
            Ok(MessageType::Readlink) => "READLINK",
            Ok(MessageType::Symlink) => "SYMLINK",
            Ok(MessageType::Status) => "STATUS",
            Ok(MessageType::Handle) => "HANDLE",
            Ok(MessageType::Data) => "DATA",
            Ok(MessageType::Name) => "NAME",
            Ok(MessageType::Attrs) => "ATTRS",
            Err(_) => "UNKNOWN",
        }
    }
}

/// SFTP status codes (draft-ietf-secsh-filexfer-02)
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Success
    Ok = 0,
    /// End of file / end of listing
    Eof = 1,
    /// No such file or directory
    NoSuchFile = 2,
    /// Permission denied
    PermissionDenied = 3,
    /// General failure
    Failure = 4,
    /// Bad message
    BadMessage = 5,
    /// No connection
    NoConnection = 6,
    /// Connection lost
    ConnectionLost = 7,
    /// Operation not supported
    OpUnsupported = 8,
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> u32 {
        code as u32
    }
}

/// File open flags (pflags of SSH_FXP_OPEN, draft-02 values)
#[derive(Debug, Clone, Copy)]
pub struct OpenFlags(pub u32);

impl OpenFlags {
    pub const READ: u32 = 0x00000001;
    pub const WRITE: u32 = 0x00000002;
    pub const APPEND: u32 = 0x00000004;
    pub const CREAT: u32 = 0x00000008;
    pub const TRUNC: u32 = 0x00000010;
    pub const EXCL: u32 = 0x00000020;

    pub fn has_read(&self) -> bool {
        self.0 & Self::READ != 0
    }

    pub fn has_write(&self) -> bool {
        self.0 & Self::WRITE != 0
    }

    pub fn has_append(&self) -> bool {
        self.0 & Self::APPEND != 0
    }

    pub fn has_creat(&self) -> bool {
        self.0 & Self::CREAT != 0
    }

    pub fn has_trunc(&self) -> bool {
        self.0 & Self::TRUNC != 0
    }

    pub fn has_excl(&self) -> bool {
        self.0 & Self::EXCL != 0
    }

    /// Effective read access: the READ bit.
    pub fn wants_read(&self) -> bool {
        self.has_read()
    }

    /// Effective write access: any of WRITE, APPEND, CREAT, TRUNC.
    ///
    /// Creation and truncation mutate the file even without the WRITE
    /// bit, so they gate on the upload capability too.
    pub fn wants_write(&self) -> bool {
        self.has_write() || self.has_append() || self.has_creat() || self.has_trunc()
    }

    /// Creation disposition recorded on the handle at open time.
    pub fn disposition(&self) -> Disposition {
        if self.has_trunc() {
            Disposition::Truncate
        } else if self.has_creat() {
            Disposition::Create
        } else if self.has_append() {
            Disposition::Append
        } else {
            Disposition::OpenExisting
        }
    }
}

/// How OPEN resolves the target, chosen from the highest-priority pflag
/// present: truncate > create > append > open-existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Truncate,
    Create,
    Append,
    OpenExisting,
}

/// Default POSIX permission word reported for directories (drwxrwxr-x).
pub const DIR_PERMISSIONS: u32 = 0x41FD;
/// Default POSIX permission word reported for regular files (-rw-r--r--).
pub const FILE_PERMISSIONS: u32 = 0x81A4;

/// File attributes (as defined in SFTP spec)
///
/// Each field is present on the wire iff its bit is set in the leading
/// flags word: size=0x01, uid/gid=0x02, permissions=0x04, acmodtime=0x08.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttrs {
    pub size: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub permissions: Option<u32>,
    pub atime: Option<u32>,
    pub mtime: Option<u32>,
}

impl FileAttrs {
    const FLAG_SIZE: u32 = 0x00000001;
    const FLAG_UIDGID: u32 = 0x00000002;
    const FLAG_PERMISSIONS: u32 = 0x00000004;
    const FLAG_ACMODTIME: u32 = 0x00000008;

    /// Attributes reported for directory entries and stat responses:
    /// all four groups present (flags 0x0F), uid/gid zero, canned
    /// permission words, size zero for directories.
    pub fn for_entry(is_dir: bool, size: u64, atime: u32, mtime: u32) -> Self {
        Self {
            size: Some(if is_dir { 0 } else { size }),
            uid: Some(0),
            gid: Some(0),
            permissions: Some(if is_dir { DIR_PERMISSIONS } else { FILE_PERMISSIONS }),
            atime: Some(atime),
            mtime: Some(mtime),
        }
    }

    /// Map host metadata onto the wire defaults of [`FileAttrs::for_entry`].
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let secs = |t: std::io::Result<std::time::SystemTime>| {
            t.ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as u32)
                .unwrap_or(0)
        };
        Self::for_entry(
            metadata.is_dir(),
            metadata.len(),
            secs(metadata.accessed()),
            secs(metadata.modified()),
        )
    }

    /// Encode file attributes to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        let mut flags = 0u32;

        if self.size.is_some() {
            flags |= Self::FLAG_SIZE;
        }
        if self.uid.is_some() && self.gid.is_some() {
            flags |= Self::FLAG_UIDGID;
        }
        if self.permissions.is_some() {
            flags |= Self::FLAG_PERMISSIONS;
        }
        if self.atime.is_some() && self.mtime.is_some() {
            flags |= Self::FLAG_ACMODTIME;
        }

        buf.put_u32(flags);

        if let Some(size) = self.size {
            buf.put_u64(size);
        }
        if let (Some(uid), Some(gid)) = (self.uid, self.gid) {
            buf.put_u32(uid);
            buf.put_u32(gid);
        }
        if let Some(permissions) = self.permissions {
            buf.put_u32(permissions);
        }
        if let (Some(atime), Some(mtime)) = (self.atime, self.mtime) {
            buf.put_u32(atime);
            buf.put_u32(mtime);
        }

        buf
    }

    /// Decode file attributes from bytes
    pub fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        if buf.remaining() < 4 {
            return Err(crate::Error::Protocol("Insufficient data for flags".into()));
        }

        let flags = buf.get_u32();
        let mut attrs = FileAttrs::default();

        if flags & Self::FLAG_SIZE != 0 {
            if buf.remaining() < 8 {
                return Err(crate::Error::Protocol("Insufficient data for size".into()));
            }
            attrs.size = Some(buf.get_u64());
        }

        if flags & Self::FLAG_UIDGID != 0 {
            if buf.remaining() < 8 {
                return Err(crate::Error::Protocol("Insufficient data for uid/gid".into()));
            }
            attrs.uid = Some(buf.get_u32());
            attrs.gid = Some(buf.get_u32());
        }

        if flags & Self::FLAG_PERMISSIONS != 0 {
            if buf.remaining() < 4 {
                return Err(crate::Error::Protocol(
                    "Insufficient data for permissions".into(),
                ));
            }
            attrs.permissions = Some(buf.get_u32());
        }

        if flags & Self::FLAG_ACMODTIME != 0 {
            if buf.remaining() < 8 {
                return Err(crate::Error::Protocol(
                    "Insufficient data for atime/mtime".into(),
                ));
            }
            attrs.atime = Some(buf.get_u32());
            attrs.mtime = Some(buf.get_u32());
        }

        Ok(attrs)
    }
}

/// Render the `ls -l` style longname used in NAME packets:
/// permission string, link count 1, canned owner/group, size
/// right-aligned to width 10, `Mon DD HH:MM`, then the filename.
pub fn format_longname(name: &str, is_dir: bool, size: u64, mtime: u32) -> String {
    let perms = if is_dir { "drwxrwxr-x" } else { "-rw-r--r--" };
    let size = if is_dir { 0 } else { size };
    let stamp = match Utc.timestamp_opt(mtime as i64, 0).single() {
        Some(when) => when.format("%b %d %H:%M").to_string(),
        None => "Jan 01 00:00".to_string(),
    };
    format!(
        "{}   1 owner    group    {:>10} {} {}",
        perms, size, stamp, name
    )
}

/// Helper functions for encoding/decoding SFTP protocol primitives
pub mod codec {
    use bytes::{Buf, BufMut, BytesMut};

    /// Decode a big-endian u32
    pub fn get_u32(buf: &mut &[u8]) -> crate::Result<u32> {
        if buf.remaining() < 4 {
            return Err(crate::Error::Protocol("Insufficient data for u32".into()));
        }
        Ok(buf.get_u32())
    }

    /// Decode a big-endian u64 (file offsets)
    pub fn get_u64(buf: &mut &[u8]) -> crate::Result<u64> {
        if buf.remaining() < 8 {
            return Err(crate::Error::Protocol("Insufficient data for u64".into()));
        }
        Ok(buf.get_u64())
    }

    /// Encode a string as SFTP string (length + data)
    pub fn put_string(buf: &mut BytesMut, s: &str) {
        buf.put_u32(s.len() as u32);
        buf.put_slice(s.as_bytes());
    }

    /// Decode an SFTP string
    pub fn get_string(buf: &mut &[u8]) -> crate::Result<String> {
        let bytes = get_bytes(buf)?;
        String::from_utf8(bytes)
            .map_err(|e| crate::Error::Protocol(format!("Invalid UTF-8 string: {}", e)))
    }

    /// Encode bytes as SFTP string (length + data)
    pub fn put_bytes(buf: &mut BytesMut, data: &[u8]) {
        buf.put_u32(data.len() as u32);
        buf.put_slice(data);
    }

    /// Decode SFTP bytes
    pub fn get_bytes(buf: &mut &[u8]) -> crate::Result<Vec<u8>> {
        if buf.remaining() < 4 {
            return Err(crate::Error::Protocol(
                "Insufficient data for string length".into(),
            ));
        }

        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(crate::Error::Protocol("Insufficient data for string".into()));
        }

        let bytes = &buf[..len];
        buf.advance(len);

        Ok(bytes.to_vec())
    }
}
