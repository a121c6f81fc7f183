//! ZIP archives.
//!
//! The central directory is read once with the `zip` crate. Each member's
//! data offset is recorded so a later open only needs to seek and decode
//! that member's bytes, without rebuilding the archive index.

use crate::engine::{ArchiveFormat, ArchiveFs, ArchiveHeader};
use crate::source;
use bzip2::read::BzDecoder;
use chrono::{DateTime, NaiveDate, Utc};
use flate2::read::DeflateDecoder;
use nsvfs_core::{path, Error, FileSystem, Result, Tracer, VfsFile};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

/// Storage method of a member, as far as this crate can decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflated,
    Bzip2,
    Unsupported,
}

impl From<CompressionMethod> for Method {
    fn from(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Stored => Method::Stored,
            CompressionMethod::Deflated => Method::Deflated,
            CompressionMethod::Bzip2 => Method::Bzip2,
            _ => Method::Unsupported,
        }
    }
}

/// One central-directory record.
#[derive(Debug, Clone)]
pub struct ZipHeader {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    /// Byte offset of the member data within the archive.
    pub data_start: u64,
    pub method: Method,
    pub modified: Option<DateTime<Utc>>,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
    pub encrypted: bool,
}

impl ArchiveHeader for ZipHeader {
    fn native_name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mod_time(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn mode(&self) -> u32 {
        match self.unix_mode {
            Some(mode) => mode & 0o777,
            None if self.is_dir => 0o555,
            None => 0o444,
        }
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// DOS timestamps carry no zone; they are taken as UTC.
fn to_utc(dt: zip::DateTime) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(dt.year().into(), dt.month().into(), dt.day().into())?
        .and_hms_opt(dt.hour().into(), dt.minute().into(), dt.second().into())
        .map(|naive| naive.and_utc())
}

fn zip_error(err: ZipError) -> Error {
    match err {
        ZipError::Io(err) => Error::Io(err),
        ZipError::InvalidArchive(msg) => Error::UnsupportedFormat(msg.to_string()),
        ZipError::UnsupportedArchive(msg) => Error::UnsupportedFormat(msg.to_string()),
        other => Error::Io(io::Error::other(other)),
    }
}

/// A byte source `ZipArchive` can seek in.
enum Seekable {
    Direct(Box<dyn VfsFile>),
    Buffered(Cursor<Vec<u8>>),
}

impl Seekable {
    fn new(mut source: Box<dyn VfsFile>) -> Result<Self> {
        if source.is_seekable() {
            return Ok(Seekable::Direct(source));
        }
        // Nested members can only be read forward.
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Ok(Seekable::Buffered(Cursor::new(data)))
    }
}

impl Read for Seekable {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Seekable::Direct(file) => file.read(buf),
            Seekable::Buffered(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for Seekable {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Seekable::Direct(file) => file.seek(pos),
            Seekable::Buffered(cursor) => cursor.seek(pos),
        }
    }
}

/// ZIP decoder for [`ArchiveFs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipFormat;

impl ArchiveFormat for ZipFormat {
    type Header = ZipHeader;

    fn label(&self) -> &'static str {
        "zipfs"
    }

    fn read_headers(&self, source: Box<dyn VfsFile>) -> Result<Vec<ZipHeader>> {
        let mut archive = ZipArchive::new(Seekable::new(source)?).map_err(zip_error)?;
        let mut headers = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(zip_error)?;
            let modified: Option<zip::DateTime> = file.last_modified().into();
            headers.push(ZipHeader {
                name: file.name().to_string(),
                size: file.size(),
                compressed_size: file.compressed_size(),
                data_start: file.data_start(),
                method: file.compression().into(),
                modified: modified.and_then(to_utc),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
                encrypted: file.encrypted(),
            });
        }
        Ok(headers)
    }

    fn open_member(
        &self,
        source: Box<dyn VfsFile>,
        header: &ZipHeader,
    ) -> Result<Box<dyn Read + Send>> {
        if header.encrypted {
            return Err(Error::UnsupportedFormat(format!(
                "{}: encrypted zip member",
                header.name
            )));
        }

        let mut source = Seekable::new(source)?;
        source.seek(SeekFrom::Start(header.data_start))?;
        let raw = source.take(header.compressed_size);
        Ok(match header.method {
            Method::Stored => Box::new(raw),
            Method::Deflated => Box::new(DeflateDecoder::new(raw)),
            Method::Bzip2 => Box::new(BzDecoder::new(raw)),
            Method::Unsupported => {
                return Err(Error::UnsupportedFormat(format!(
                    "{}: unsupported compression method",
                    header.name
                )))
            }
        })
    }
}

/// Read-only filesystem over a ZIP archive.
pub type ZipFs = ArchiveFs<ZipFormat>;

/// Open the ZIP archive at a host path.
pub fn open(host: impl AsRef<Path>, tracer: Tracer) -> Result<ZipFs> {
    let host = host.as_ref();
    ArchiveFs::open(
        host.display().to_string(),
        ZipFormat,
        source::host_file(host),
        tracer,
    )
}

/// Open the ZIP archive stored at `name` inside `fs`.
pub fn open_in(fs: Arc<dyn FileSystem>, name: &str, tracer: Tracer) -> Result<ZipFs> {
    let name = path::clean(name);
    ArchiveFs::open(
        name.clone(),
        ZipFormat,
        source::in_filesystem(fs, &name),
        tracer,
    )
}
