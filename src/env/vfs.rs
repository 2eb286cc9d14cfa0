//! Virtual file system used by `find-file` and `include`.
//!
//! The evaluator never touches the disk directly; it resolves names
//! against the environment's base location through this trait, so tests
//! and sandboxed hosts can supply files from memory.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Error type for VFS operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("read error: {0}")]
    ReadError(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Virtual File System trait.
pub trait VirtualFileSystem: Send + Sync {
    /// Read a file as text.
    fn read_text(&self, path: &str) -> VfsResult<String>;

    /// Check if a file exists.
    fn exists(&self, path: &str) -> bool;

    /// Resolve a relative path against the file `base`.
    fn resolve(&self, base: &str, relative: &str) -> VfsResult<String> {
        if relative.starts_with('/') {
            return Ok(relative.to_string());
        }
        let parent = Path::new(base).parent().unwrap_or(Path::new(""));
        normalize(&parent.join(relative))
            .ok_or_else(|| VfsError::InvalidPath(relative.to_string()))
    }
}

/// Collapse `.` and `..` components.
fn normalize(path: &Path) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::Prefix(_) => {}
            Component::RootDir => {
                parts.clear();
                absolute = true;
            }
            Component::Normal(s) => parts.push(s.to_str()?),
        }
    }
    let joined = parts.join("/");
    Some(if absolute { format!("/{}", joined) } else { joined })
}

/// A VFS where no file exists.
///
/// Useful for sandboxed environments where file access is not allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVfs;

impl VirtualFileSystem for NoopVfs {
    fn read_text(&self, path: &str) -> VfsResult<String> {
        Err(VfsError::NotFound(path.to_string()))
    }

    fn exists(&self, _path: &str) -> bool {
        false
    }
}

/// An in-memory VFS for testing and bundled style files.
#[derive(Debug, Clone, Default)]
pub struct MemoryVfs {
    files: HashMap<String, String>,
}

impl MemoryVfs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl VirtualFileSystem for MemoryVfs {
    fn read_text(&self, path: &str) -> VfsResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

/// The real file system, with relative paths taken from `root`.
#[derive(Debug, Clone)]
pub struct RealVfs {
    root: PathBuf,
}

impl RealVfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.root.join(path)
        }
    }
}

impl VirtualFileSystem for RealVfs {
    fn read_text(&self, path: &str) -> VfsResult<String> {
        std::fs::read_to_string(self.full_path(path)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => VfsError::PermissionDenied(path.to_string()),
            _ => VfsError::ReadError(e.to_string()),
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }
}
