//! # nsvfs-archive
//!
//! Read-only filesystems over archive files.
//!
//! This crate provides:
//! - A format-independent engine ([`ArchiveFs`]) that indexes an archive once
//!   and answers stat, read_dir and open from a sorted entry table
//! - ZIP support ([`zipfs`])
//! - Tar support with transparent gzip, bzip2 and xz decompression ([`tarfs`])
//! - RAR support through the unrar library ([`rarfs`], with the `rar` feature)
//!
//! Member streams are forward-only: they can be rewound to the start, which
//! reopens the archive, but any other seek fails.
//!
//! ## Features
//!
//! - `rar` (default): RAR archives via the bundled unrar library
//!
//! ## Example
//!
//! ```ignore
//! use nsvfs_archive::zipfs;
//! use nsvfs_core::{FileSystem, Tracer};
//!
//! let fs = zipfs::open("bundle.zip", Tracer::disabled())?;
//! for record in fs.read_dir("/")? {
//!     println!("{} {}", record.mode_string(), record.name);
//! }
//! ```

pub mod decompress;
mod engine;
#[cfg(feature = "rar")]
pub mod rarfs;
pub mod source;
pub mod tarfs;
pub mod zipfs;

pub use engine::{ArchiveFormat, ArchiveFs, ArchiveHeader, MemberStream, Reopen};

use nsvfs_core::{path, Error, FileSystem, Result, Tracer};
use secrecy::SecretString;
use std::sync::Arc;

/// Archive formats recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    Rar,
}

impl ArchiveKind {
    /// Pick a format from a file name, ignoring case.
    ///
    /// Only the final extension counts, so `x.tar.gz` is not recognised even
    /// though [`tarfs`] would decode it.
    pub fn from_name(name: &str) -> Option<Self> {
        match path::extension(name).to_ascii_lowercase().as_str() {
            ".zip" => Some(ArchiveKind::Zip),
            ".tar" => Some(ArchiveKind::Tar),
            ".rar" => Some(ArchiveKind::Rar),
            _ => None,
        }
    }

    /// Open the archive stored at `name` inside `fs` as a filesystem.
    ///
    /// `password` is only used for RAR archives.
    pub fn open_in(
        self,
        fs: Arc<dyn FileSystem>,
        name: &str,
        password: Option<SecretString>,
        tracer: Tracer,
    ) -> Result<Arc<dyn FileSystem>> {
        match self {
            ArchiveKind::Zip => Ok(Arc::new(zipfs::open_in(fs, name, tracer)?)),
            ArchiveKind::Tar => Ok(Arc::new(tarfs::open_in(fs, name, tracer)?)),
            #[cfg(feature = "rar")]
            ArchiveKind::Rar => Ok(Arc::new(rarfs::open_in(fs, name, password, tracer)?)),
            #[cfg(not(feature = "rar"))]
            ArchiveKind::Rar => {
                let _ = (fs, password, tracer);
                Err(Error::UnsupportedFormat(format!(
                    "{}: built without RAR support",
                    name
                )))
            }
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Tar => "tar",
            ArchiveKind::Rar => "rar",
        })
    }
}

/// Open `name` inside `fs` if its extension names a known archive format.
///
/// Returns [`Error::UnsupportedFormat`] for unrecognised extensions.
pub fn open_in(
    fs: Arc<dyn FileSystem>,
    name: &str,
    password: Option<SecretString>,
    tracer: Tracer,
) -> Result<Arc<dyn FileSystem>> {
    match ArchiveKind::from_name(name) {
        Some(kind) => kind.open_in(fs, name, password, tracer),
        None => Err(Error::UnsupportedFormat(format!(
            "{}: unknown archive extension",
            name
        ))),
    }
}
