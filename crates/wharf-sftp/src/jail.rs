//! Per-user path jail
//!
//! NIST 800-53: AC-3 (Access Enforcement), SI-10 (Input Validation)
//! STIG: V-222396, V-222596 - Prevent path traversal
//! Implementation: Maps virtual POSIX-style client paths onto a physical
//! root and clamps every escape attempt back to the root.

use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Maps virtual client paths onto an absolute physical root.
///
/// Invariant: every path returned by [`PathJail::to_physical`] is
/// prefix-equal to the canonical root. A request that would escape is
/// transparently clamped to the root itself - the client sees the root's
/// contents but cannot leave it. Clamping is not an error.
#[derive(Debug, Clone)]
pub struct PathJail {
    root: PathBuf,
}

impl PathJail {
    /// Build a jail over `root`, creating the directory if absent and
    /// canonicalizing it so prefix checks compare resolved paths.
    pub fn new(root: impl AsRef<Path>) -> crate::Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            std::fs::create_dir_all(root)?;
        }
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// The canonical physical root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual path to a physical one inside the root.
    ///
    /// Empty string, "." and "/" name the root. The path is joined onto
    /// the root, lexically normalized ("..", ".", repeated separators),
    /// and prefix-checked; a result outside the root clamps to the root.
    pub fn to_physical(&self, virtual_path: &str) -> PathBuf {
        if virtual_path.is_empty() || virtual_path == "." || virtual_path == "/" {
            return self.root.clone();
        }

        let relative = virtual_path.trim_start_matches('/');
        let mut joined = self.root.clone();
        for part in relative.split('/').filter(|p| !p.is_empty()) {
            joined.push(part);
        }

        let resolved = normalize(&joined);
        if !contains(&self.root, &resolved) {
            warn!(
                event = "path_traversal_clamped",
                requested = virtual_path,
                "Path escapes the jail root, clamping to root"
            );
            return self.root.clone();
        }
        resolved
    }

    /// Clamp an already-physical path (a resolved symlink target, say)
    /// back into the root: lexically normalize, then replace anything
    /// outside the root with the root itself.
    pub fn clamp(&self, physical: &Path) -> PathBuf {
        let resolved = normalize(physical);
        if contains(&self.root, &resolved) {
            resolved
        } else {
            self.root.clone()
        }
    }

    /// Invert [`PathJail::to_physical`]: produce the "/"-rooted virtual
    /// form of a physical path. The root itself becomes "/".
    pub fn to_virtual(&self, physical: &Path) -> String {
        let suffix = match physical.strip_prefix(&self.root) {
            Ok(s) => s,
            Err(_) => return "/".to_string(),
        };

        let parts: Vec<String> = suffix
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", parts.join("/"))
        }
    }
}

/// Lexical normalization: resolves "." and ".." without consulting the
/// filesystem, so targets that do not exist yet (OPEN with create) still
/// resolve. ".." may pop above the root; the caller prefix-checks.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Prefix containment check. Case-insensitive on hosts whose filesystems
/// are (component comparison handles separator normalization).
fn contains(root: &Path, candidate: &Path) -> bool {
    #[cfg(windows)]
    {
        let root = root.to_string_lossy().to_lowercase();
        let candidate = candidate.to_string_lossy().to_lowercase();
        Path::new(&candidate).starts_with(Path::new(&root))
    }
    #[cfg(not(windows))]
    {
        candidate.starts_with(root)
    }
}
