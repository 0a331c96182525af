use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;

/// Read permission for "other" in a unix mode.
const WORLD_READABLE: u32 = 0o004;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("path escapes the document root: {0}")]
    Traversal(String),
    #[error("no such file: {}", .0.display())]
    NotFound(PathBuf),
    #[error("file is not world-readable: {}", .0.display())]
    Forbidden(PathBuf),
    #[error("target is a directory: {}", .0.display())]
    Directory(PathBuf),
    #[error("failed to map {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file mapped read-only for the duration of one response.
///
/// Dropping it releases the mapping; zero-length files carry no mapping.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    map: Option<Mmap>,
}

impl MappedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }
}

/// The directory all request paths are resolved against.
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Appends the request path to the root.
    ///
    /// The path is concatenated rather than joined so that its leading `/`
    /// stays below the root. Any `..` segment is rejected.
    pub fn resolve_path(&self, url: &str) -> Result<PathBuf, ResolveError> {
        if url.split('/').any(|segment| segment == "..") {
            return Err(ResolveError::Traversal(url.to_string()));
        }
        let mut path = OsString::from(self.root.as_os_str());
        path.push(url);
        Ok(PathBuf::from(path))
    }

    /// Checks the target and maps it into memory.
    ///
    /// Missing files, files without world-read permission and directories
    /// are reported in that order.
    pub fn open(&self, url: &str) -> Result<MappedFile, ResolveError> {
        let path = self.resolve_path(url)?;

        let Ok(meta) = fs::metadata(&path) else {
            return Err(ResolveError::NotFound(path));
        };
        if meta.permissions().mode() & WORLD_READABLE == 0 {
            return Err(ResolveError::Forbidden(path));
        }
        if meta.is_dir() {
            return Err(ResolveError::Directory(path));
        }

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(source) => return Err(ResolveError::Io { path, source }),
        };
        if meta.len() == 0 {
            return Ok(MappedFile { path, map: None });
        }

        // SAFETY: the mapping is read-only and private to this response;
        // files under the document root are not modified while served.
        match unsafe { Mmap::map(&file) } {
            Ok(map) => Ok(MappedFile {
                path,
                map: Some(map),
            }),
            Err(source) => Err(ResolveError::Io { path, source }),
        }
    }
}
