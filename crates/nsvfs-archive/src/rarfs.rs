//! RAR archives via the `unrar` library.
//!
//! unrar only opens archives by host path, so sources without one are
//! spooled to a temporary file first. Members are extracted whole into
//! memory when opened.

use crate::engine::{ArchiveFormat, ArchiveFs, ArchiveHeader};
use crate::source;
use chrono::{DateTime, NaiveDate, Utc};
use nsvfs_core::{path, Error, FileSystem, Result, Tracer, VfsFile};
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use unrar::error::{Code, UnrarError};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

/// One RAR file header.
#[derive(Debug, Clone)]
pub struct RarHeader {
    pub name: String,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub attr: u32,
    pub is_dir: bool,
}

impl ArchiveHeader for RarHeader {
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
        // Archives made on Windows store DOS attributes, which never carry type bits.
        match self.attr & S_IFMT {
            0 if self.is_dir => 0o555,
            0 => 0o444,
            _ => self.attr & 0o777,
        }
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// Links, devices, fifos and sockets are left out of the index.
fn is_special(attr: u32) -> bool {
    !matches!(attr & S_IFMT, 0 | S_IFDIR | S_IFREG)
}

fn dos_time(t: u32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(
        ((t >> 25) & 0x7f) as i32 + 1980,
        (t >> 21) & 0x0f,
        (t >> 16) & 0x1f,
    )?;
    date.and_hms_opt((t >> 11) & 0x1f, (t >> 5) & 0x3f, (t & 0x1f) * 2)
        .map(|naive| naive.and_utc())
}

fn rar_error(err: UnrarError, archive: &Path) -> Error {
    let name = archive.display().to_string();
    match err.code {
        Code::BadArchive | Code::UnknownFormat | Code::BadData => {
            Error::UnsupportedFormat(format!("{}: {}", name, err))
        }
        Code::EOpen if !archive.exists() => Error::NotExist(name),
        _ => Error::Io(io::Error::other(format!("{}: {}", name, err))),
    }
}

/// Host location of an archive for the duration of one unrar call.
enum Spooled {
    Host(PathBuf),
    Temp(NamedTempFile),
}

impl Spooled {
    fn new(mut source: Box<dyn VfsFile>) -> Result<Self> {
        if let Some(path) = source.host_path() {
            return Ok(Spooled::Host(path.to_path_buf()));
        }
        let mut temp = NamedTempFile::new()?;
        io::copy(&mut source, &mut temp)?;
        Ok(Spooled::Temp(temp))
    }

    fn path(&self) -> &Path {
        match self {
            Spooled::Host(path) => path,
            Spooled::Temp(temp) => temp.path(),
        }
    }
}

/// RAR decoder for [`ArchiveFs`].
#[derive(Debug, Clone, Default)]
pub struct RarFormat {
    password: Option<SecretString>,
}

impl RarFormat {
    pub fn new(password: Option<SecretString>) -> Self {
        Self { password }
    }

    fn archive<'a>(&'a self, path: &'a Path) -> unrar::Archive<'a> {
        match &self.password {
            Some(password) => {
                unrar::Archive::with_password(path, password.expose_secret().as_bytes())
            }
            None => unrar::Archive::new(path),
        }
    }
}

impl ArchiveFormat for RarFormat {
    type Header = RarHeader;

    fn label(&self) -> &'static str {
        "rarfs"
    }

    fn read_headers(&self, source: Box<dyn VfsFile>) -> Result<Vec<RarHeader>> {
        let spooled = Spooled::new(source)?;
        let path = spooled.path();
        let listing = self
            .archive(path)
            .open_for_listing()
            .map_err(|e| rar_error(e, path))?;

        let mut headers = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|e| rar_error(e, path))?;
            if is_special(entry.file_attr) {
                continue;
            }
            headers.push(RarHeader {
                name: entry.filename.to_string_lossy().into_owned(),
                size: entry.unpacked_size,
                mtime: dos_time(entry.file_time),
                attr: entry.file_attr,
                is_dir: entry.is_directory(),
            });
        }
        Ok(headers)
    }

    fn open_member(
        &self,
        source: Box<dyn VfsFile>,
        header: &RarHeader,
    ) -> Result<Box<dyn Read + Send>> {
        let spooled = Spooled::new(source)?;
        let path = spooled.path();
        let mut cursor = self
            .archive(path)
            .open_for_processing()
            .map_err(|e| rar_error(e, path))?;

        while let Some(entry) = cursor.read_header().map_err(|e| rar_error(e, path))? {
            if entry.entry().filename.to_string_lossy() == header.name {
                let (data, _) = entry.read().map_err(|e| rar_error(e, path))?;
                return Ok(Box::new(Cursor::new(data)));
            }
            cursor = entry.skip().map_err(|e| rar_error(e, path))?;
        }
        Err(Error::NotExist(header.name.clone()))
    }
}

/// Read-only filesystem over a RAR archive.
pub type RarFs = ArchiveFs<RarFormat>;

/// Open the RAR archive at a host path.
pub fn open(
    host: impl AsRef<Path>,
    password: Option<SecretString>,
    tracer: Tracer,
) -> Result<RarFs> {
    let host = host.as_ref();
    ArchiveFs::open(
        host.display().to_string(),
        RarFormat::new(password),
        source::host_file(host),
        tracer,
    )
}

/// Open the RAR archive stored at `name` inside `fs`.
pub fn open_in(
    fs: Arc<dyn FileSystem>,
    name: &str,
    password: Option<SecretString>,
    tracer: Tracer,
) -> Result<RarFs> {
    let name = path::clean(name);
    ArchiveFs::open(
        name.clone(),
        RarFormat::new(password),
        source::in_filesystem(fs, &name),
        tracer,
    )
}
