use crate::error::{Error, Result};
use crate::fs::{FileSystem, VfsFile};
use crate::path;
use crate::record::{FileRecord, MODE_DIR};
use crate::trace::Tracer;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Host directory tree exposed as a filesystem.
#[derive(Debug, Clone)]
pub struct OsFs {
    root: PathBuf,
    tracer: Tracer,
}

impl OsFs {
    /// Expose the host directory `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_tracer(root, Tracer::disabled())
    }

    /// Expose the host directory `root`, tracing every call.
    pub fn with_tracer(root: impl Into<PathBuf>, tracer: Tracer) -> Self {
        Self {
            root: root.into(),
            tracer,
        }
    }

    /// The host directory this filesystem is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically resolve a namespace path below the root.
    ///
    /// The path is cleaned as a rooted path first, so `..` cannot escape.
    fn resolve(&self, name: &str) -> PathBuf {
        let cleaned = path::clean(name);
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}

fn local_name(host: &Path) -> String {
    host.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(unix)]
fn permissions(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn permissions(meta: &Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, true) => 0o555,
        (true, false) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

fn record_from_metadata(name: String, meta: &Metadata) -> FileRecord {
    let mod_time = meta.modified().ok().map(DateTime::<Utc>::from);
    let mut record = FileRecord::file(name, meta.len(), mod_time, permissions(meta));
    if meta.is_dir() {
        record.is_dir = true;
        record.mode |= MODE_DIR;
    }
    record
}

impl FileSystem for OsFs {
    fn stat(&self, name: &str) -> Result<FileRecord> {
        let host = self.resolve(name);
        self.tracer.trace(self, format_args!("Stat({:?})", host));
        let meta = fs::metadata(&host).map_err(|e| Error::from_io(e, name))?;
        Ok(record_from_metadata(local_name(&host), &meta))
    }

    fn lstat(&self, name: &str) -> Result<FileRecord> {
        let host = self.resolve(name);
        self.tracer.trace(self, format_args!("Lstat({:?})", host));
        let meta = fs::symlink_metadata(&host).map_err(|e| Error::from_io(e, name))?;
        Ok(record_from_metadata(local_name(&host), &meta))
    }

    fn read_dir(&self, name: &str) -> Result<Vec<FileRecord>> {
        let host = self.resolve(name);
        self.tracer.trace(self, format_args!("Readdir({:?})", host));
        let mut records = Vec::new();
        for entry in fs::read_dir(&host).map_err(|e| Error::from_io(e, name))? {
            let entry = entry?;
            let meta = entry.metadata()?;
            let local = entry.file_name().to_string_lossy().into_owned();
            records.push(record_from_metadata(local, &meta));
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn open(&self, name: &str) -> Result<Box<dyn VfsFile>> {
        let host = self.resolve(name);
        self.tracer.trace(self, format_args!("Open({:?})", host));
        let file = OsFile::open(&host).map_err(|e| Error::from_io(e, name))?;
        if file.file.metadata()?.is_dir() {
            return Err(Error::IsADirectory(name.to_string()));
        }
        Ok(Box::new(file))
    }
}

impl fmt::Display for OsFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "osFileSystem({})", self.root.display())
    }
}

/// Host file handle remembering the path it was opened from.
#[derive(Debug)]
pub struct OsFile {
    file: File,
    path: PathBuf,
}

impl OsFile {
    /// Open a host file for reading.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Self { file, path })
    }
}

impl Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for OsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl VfsFile for OsFile {
    fn host_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
