//! Server configuration

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SFTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Server port (default: 2222 for non-privileged use)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base directory under which relative user home directories are
    /// anchored; created if absent
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// SSH host key path; an ed25519 key is generated when missing
    #[serde(default = "default_host_key_path")]
    pub host_key_path: PathBuf,

    /// User accounts file (TOML, `[[users]]` tables)
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,

    /// Audit trail file
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,

    /// Maximum concurrent connections across all users
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Seconds of channel inactivity before the session is closed;
    /// 0 disables the idle timeout
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Server-wide upload byte ceiling per file; 0 means unlimited.
    /// The effective ceiling per session is the smallest nonzero of this
    /// and the user's own ceiling.
    #[serde(default)]
    pub max_upload_bytes: u64,

    /// Enable verbose per-packet trace output
    #[serde(default)]
    pub verbose: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
///
/// NIST 800-53: AU-9 (Protection of Audit Information), AU-12 (Audit
/// Generation)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (text or json)
    pub format: LogFormat,
    /// Optional log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text logging for human readability
    Text,
    /// JSON structured logging for SIEM integration
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            root_dir: default_root_dir(),
            host_key_path: default_host_key_path(),
            users_file: default_users_file(),
            audit_log: default_audit_log(),
            max_connections: default_max_connections(),
            idle_timeout_secs: default_idle_timeout(),
            max_upload_bytes: 0,
            verbose: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_connections == 0 {
            return Err(crate::Error::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        if !self.users_file.exists() {
            return Err(crate::Error::Config(format!(
                "Users file does not exist: {:?}",
                self.users_file
            )));
        }

        Ok(())
    }

    /// Anchor a user's home directory: relative homes live under
    /// `root_dir`, absolute homes are taken as-is.
    pub fn resolve_home(&self, home_dir: &std::path::Path) -> PathBuf {
        if home_dir.is_absolute() {
            home_dir.to_path_buf()
        } else {
            self.root_dir.join(home_dir)
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2222 // Non-privileged port
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/srv/wharf")
}

fn default_host_key_path() -> PathBuf {
    PathBuf::from("/etc/wharf/ssh_host_ed25519_key")
}

fn default_users_file() -> PathBuf {
    PathBuf::from("/etc/wharf/users.toml")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("/var/log/wharf/sftp-audit.log")
}

fn default_max_connections() -> usize {
    100
}

fn default_idle_timeout() -> u64 {
    300 // 5 minutes
}
