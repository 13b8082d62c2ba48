//! Error types for SFTP operations
//!
//! NIST 800-53: SI-11 (Error Handling)
//! STIG: V-222566 - Error messages must provide information necessary for
//! corrective actions without revealing information that could be exploited
//! Implementation: Typed errors with a 1:1 mapping onto SSH_FX status codes

use thiserror::Error;

/// Result type alias for SFTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// SFTP error types
///
/// Every filesystem call in the subsystem returns one of these; request
/// handlers never panic and never let an error escape the request that
/// produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the host filesystem
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// SSH transport error
    #[error("SSH error: {0}")]
    Ssh(String),

    /// SFTP protocol violation (truncated or malformed payload)
    #[error("SFTP protocol error: {0}")]
    Protocol(String),

    /// Target path does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Capability check failed or host-level privilege denied
    ///
    /// NIST 800-53: AC-3 (Access Enforcement)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Unknown, stale, or unparseable file handle
    #[error("Invalid handle")]
    InvalidHandle,

    /// A WRITE would push the file past the effective upload ceiling
    #[error("Upload size limit exceeded")]
    UploadLimitExceeded,

    /// Unsupported SFTP operation
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// SSH channel unexpectedly closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

impl Error {
    /// Map onto the draft-ietf-secsh-filexfer-02 SSH_FX code table.
    ///
    /// Host filesystem errors keep their message text but collapse onto
    /// NO_SUCH_FILE / PERMISSION_DENIED / FAILURE by `ErrorKind`.
    pub fn to_status_code(&self) -> u32 {
        use crate::protocol::StatusCode;

        match self {
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => StatusCode::NoSuchFile as u32,
                std::io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied as u32,
                _ => StatusCode::Failure as u32,
            },
            Error::FileNotFound(_) => StatusCode::NoSuchFile as u32,
            Error::PermissionDenied(_) => StatusCode::PermissionDenied as u32,
            Error::InvalidHandle => StatusCode::Failure as u32,
            Error::UploadLimitExceeded => StatusCode::Failure as u32,
            Error::Protocol(_) => StatusCode::BadMessage as u32,
            Error::NotSupported(_) => StatusCode::OpUnsupported as u32,
            _ => StatusCode::Failure as u32,
        }
    }

    /// Check if error is security-related and should be audited
    ///
    /// NIST 800-53: AU-2 (Audit Events)
    pub fn is_security_event(&self) -> bool {
        matches!(self, Error::PermissionDenied(_) | Error::UploadLimitExceeded)
    }
}

impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        Error::Ssh(err.to_string())
    }
}

impl From<russh_keys::Error> for Error {
    fn from(err: russh_keys::Error) -> Self {
        Error::Ssh(err.to_string())
    }
}
