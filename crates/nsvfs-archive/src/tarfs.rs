//! Tar archives, optionally gzip, bzip2 or xz compressed.
//!
//! A tar stream has no index, so the whole stream is read once at open
//! time. Each header records where its data starts in the decompressed
//! stream; reading a member decompresses again and skips up to that point.

use crate::decompress::decompress;
use crate::engine::{ArchiveFormat, ArchiveFs, ArchiveHeader};
use crate::source;
use chrono::{DateTime, TimeZone, Utc};
use nsvfs_core::{path, Error, FileSystem, Result, Tracer, VfsFile};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use tar::EntryType;

/// One tar member header.
#[derive(Debug, Clone)]
pub struct TarHeader {
    pub name: String,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub mode: u32,
    pub is_dir: bool,
    /// Offset of the member data in the decompressed stream.
    pub data_offset: u64,
}

impl ArchiveHeader for TarHeader {
    fn native_name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mod_time(&self) -> Option<DateTime<Utc>> {
        self.mtime
    }

    fn mode(&self) -> u32 {
        self.mode
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Decoding failures mean the bytes are not a tar stream we can read.
fn tar_error(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::Other
        | io::ErrorKind::InvalidData
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::UnexpectedEof => Error::UnsupportedFormat(err.to_string()),
        _ => Error::Io(err),
    }
}

/// Metadata-only records that never show up as files.
fn is_metadata(kind: EntryType) -> bool {
    matches!(
        kind,
        EntryType::XHeader
            | EntryType::XGlobalHeader
            | EntryType::GNULongName
            | EntryType::GNULongLink
            | EntryType::GNUSparse
    )
}

/// Tar decoder for [`ArchiveFs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TarFormat;

impl ArchiveFormat for TarFormat {
    type Header = TarHeader;

    fn label(&self) -> &'static str {
        "tarfs"
    }

    fn read_headers(&self, source: Box<dyn VfsFile>) -> Result<Vec<TarHeader>> {
        let mut archive = tar::Archive::new(decompress(source).map_err(tar_error)?);
        let mut headers = Vec::new();
        for entry in archive.entries().map_err(tar_error)? {
            let entry = entry.map_err(tar_error)?;
            let header = entry.header();
            let kind = header.entry_type();
            if is_metadata(kind) {
                continue;
            }

            let name = entry.path().map_err(tar_error)?;
            headers.push(TarHeader {
                name: name.to_string_lossy().into_owned(),
                size: entry.size(),
                mtime: header
                    .mtime()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single()),
                mode: header.mode().map_err(tar_error)? & 0o777,
                is_dir: kind.is_dir(),
                data_offset: entry.raw_file_position(),
            });
        }
        Ok(headers)
    }

    fn open_member(
        &self,
        source: Box<dyn VfsFile>,
        header: &TarHeader,
    ) -> Result<Box<dyn Read + Send>> {
        let mut stream = decompress(source)?;
        let skipped = io::copy(&mut (&mut stream).take(header.data_offset), &mut io::sink())?;
        if skipped < header.data_offset {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{}: archive truncated", header.name),
            )));
        }
        Ok(Box::new(stream.take(header.size)))
    }
}

/// Read-only filesystem over a tar archive.
pub type TarFs = ArchiveFs<TarFormat>;

/// Open the tar archive at a host path.
pub fn open(host: impl AsRef<Path>, tracer: Tracer) -> Result<TarFs> {
    let host = host.as_ref();
    ArchiveFs::open(
        host.display().to_string(),
        TarFormat,
        source::host_file(host),
        tracer,
    )
}

/// Open the tar archive stored at `name` inside `fs`.
pub fn open_in(fs: Arc<dyn FileSystem>, name: &str, tracer: Tracer) -> Result<TarFs> {
    let name = path::clean(name);
    ArchiveFs::open(
        name.clone(),
        TarFormat,
        source::in_filesystem(fs, &name),
        tracer,
    )
}
