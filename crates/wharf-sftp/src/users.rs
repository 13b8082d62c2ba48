//! User accounts and capability lookups
//!
//! NIST 800-53: AC-2 (Account Management), AC-3 (Access Enforcement),
//! AC-6 (Least Privilege)
//! Implementation: Per-user capability flags consulted by the SFTP
//! subsystem on every gated opcode. The credential is opaque to the
//! protocol engine - only [`UserStore::verify`] ever reads it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One provisioned SFTP account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Login name
    pub username: String,

    /// Opaque credential checked at authentication time
    pub credential: String,

    /// Jail root for this user's sessions
    pub home_dir: PathBuf,

    /// Disabled accounts fail authentication even with a valid credential
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// May create and write files (OPEN for write, WRITE, SETSTAT,
    /// FSETSTAT, SYMLINK; RENAME together with delete)
    #[serde(default)]
    pub can_upload: bool,

    /// May open files for reading
    #[serde(default = "default_true")]
    pub can_download: bool,

    /// May remove files and directories (REMOVE, RMDIR; RENAME together
    /// with upload)
    #[serde(default)]
    pub can_delete: bool,

    /// May create directories (MKDIR)
    #[serde(default)]
    pub can_create_dirs: bool,

    /// Per-user upload byte ceiling; 0 means unlimited
    #[serde(default)]
    pub max_upload_bytes: u64,
}

fn default_true() -> bool {
    true
}

/// On-disk shape of the users file: a list of `[[users]]` tables.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<UserAccount>,
}

/// Username-keyed account store shared by all sessions.
///
/// Read-mostly; guarded by a mutex per the concurrency contract. The
/// subsystem consults capabilities only, never the credential.
#[derive(Debug, Default)]
pub struct UserStore {
    users: Mutex<HashMap<String, UserAccount>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load accounts from a TOML file. Duplicate usernames keep the
    /// last definition, with a warning.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read users file {:?}: {}", path, e))
        })?;
        let parsed: UsersFile = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse users file: {}", e)))?;

        let mut map = HashMap::new();
        for account in parsed.users {
            if map.insert(account.username.clone(), account.clone()).is_some() {
                warn!(
                    event = "duplicate_user",
                    username = %account.username,
                    "Users file defines this account more than once, keeping the last entry"
                );
            }
        }
        debug!(event = "users_loaded", count = map.len(), "User store loaded");

        Ok(Self {
            users: Mutex::new(map),
        })
    }

    /// Add or replace an account.
    pub async fn insert(&self, account: UserAccount) {
        self.users
            .lock()
            .await
            .insert(account.username.clone(), account);
    }

    /// Fetch an account by name.
    pub async fn lookup(&self, username: &str) -> Option<UserAccount> {
        self.users.lock().await.get(username).cloned()
    }

    /// Authentication check: the account must exist, be enabled, and the
    /// credential must match. Used only by the session orchestrator.
    pub async fn verify(&self, username: &str, credential: &str) -> bool {
        match self.users.lock().await.get(username) {
            Some(account) => account.enabled && account.credential == credential,
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}
