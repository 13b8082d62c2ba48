//! Handle table for open files and directories
//!
//! Handles are subsystem-scoped u32 identifiers allocated monotonically
//! from 1 and never reused within one subsystem lifetime. On the wire a
//! handle travels as its decimal-ASCII form inside an SFTP string field.

use crate::protocol::{Disposition, OpenFlags};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::File;

/// Access mode recorded on a file handle at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn from_flags(flags: &OpenFlags) -> Self {
        match (flags.wants_read(), flags.wants_write()) {
            (true, true) => Access::ReadWrite,
            (false, true) => Access::Write,
            // A pflags word with neither access bit is treated as a
            // plain read open.
            _ => Access::Read,
        }
    }

    pub fn readable(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// An open file: byte stream, physical path, access mode and the
/// creation disposition chosen at OPEN.
#[derive(Debug)]
pub struct FileHandle {
    pub file: File,
    pub path: PathBuf,
    pub access: Access,
    pub disposition: Disposition,
}

/// An open directory and its one-shot listing flag: the first READDIR
/// yields the full entry list, every later one reports EOF.
#[derive(Debug)]
pub struct DirHandle {
    pub path: PathBuf,
    pub yielded: bool,
}

/// Two disjoint handle domains keyed by the same counter.
///
/// A lookup in the wrong domain is "not found", exactly like a released
/// handle. Dropping a [`FileHandle`] closes the underlying file.
#[derive(Debug)]
pub struct HandleTable {
    files: HashMap<u32, FileHandle>,
    dirs: HashMap<u32, DirHandle>,
    next_id: u32,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            dirs: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn insert_file(&mut self, handle: FileHandle) -> u32 {
        let id = self.allocate();
        self.files.insert(id, handle);
        id
    }

    pub fn insert_dir(&mut self, path: PathBuf) -> u32 {
        let id = self.allocate();
        self.dirs.insert(id, DirHandle { path, yielded: false });
        id
    }

    pub fn file(&self, id: u32) -> Option<&FileHandle> {
        self.files.get(&id)
    }

    pub fn file_mut(&mut self, id: u32) -> Option<&mut FileHandle> {
        self.files.get_mut(&id)
    }

    pub fn dir_mut(&mut self, id: u32) -> Option<&mut DirHandle> {
        self.dirs.get_mut(&id)
    }

    /// Release a handle from whichever domain holds it. Files are closed
    /// by drop. Returns false for unknown or already-released handles.
    pub fn release(&mut self, id: u32) -> bool {
        self.files.remove(&id).is_some() || self.dirs.remove(&id).is_some()
    }

    /// Drop every handle; file close errors are swallowed. Called on
    /// subsystem teardown.
    pub fn clear(&mut self) {
        self.files.clear();
        self.dirs.clear();
    }

    pub fn open_count(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    /// Wire form of a handle: decimal ASCII inside the string field.
    pub fn wire(id: u32) -> String {
        id.to_string()
    }

    /// Parse a wire handle. Anything that is not the decimal form of a
    /// u32 is invalid.
    pub fn parse_wire(bytes: &[u8]) -> Option<u32> {
        std::str::from_utf8(bytes).ok()?.parse::<u32>().ok()
    }
}
