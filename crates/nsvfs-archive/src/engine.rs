//! Format-independent archive indexing.
//!
//! An archive is drained once into a sorted entry table. Directory keys
//! carry a trailing `/`, so everything below a directory forms one
//! contiguous run that binary search can find and a forward scan can list.

use chrono::{DateTime, Utc};
use nsvfs_core::{path, Error, FileRecord, FileSystem, Result, Tracer, VfsFile};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Produces a fresh byte source for the archive file on every call.
pub type Reopen = Arc<dyn Fn() -> Result<Box<dyn VfsFile>> + Send + Sync>;

/// Native entry header of an archive format.
pub trait ArchiveHeader: Clone + Send + Sync + 'static {
    /// Entry name exactly as stored in the archive.
    fn native_name(&self) -> &str;

    /// Uncompressed size in bytes.
    fn size(&self) -> u64;

    /// Modification time, if recorded.
    fn mod_time(&self) -> Option<DateTime<Utc>>;

    /// Permission bits as stored; write bits are stripped by the engine.
    fn mode(&self) -> u32;

    /// Whether the header describes a directory.
    fn is_dir(&self) -> bool;
}

/// Decoder plugged into [`ArchiveFs`].
pub trait ArchiveFormat: Send + Sync + 'static {
    /// Native header type.
    type Header: ArchiveHeader;

    /// Short label used in `Display`, e.g. `zipfs`.
    fn label(&self) -> &'static str;

    /// Drain every entry header from `source`.
    fn read_headers(&self, source: Box<dyn VfsFile>) -> Result<Vec<Self::Header>>;

    /// Decode stream of the member described by `header`.
    fn open_member(
        &self,
        source: Box<dyn VfsFile>,
        header: &Self::Header,
    ) -> Result<Box<dyn Read + Send>>;
}

#[derive(Debug, Clone)]
struct Entry<H> {
    key: String,
    header: H,
}

/// Index key: cleaned, unrooted, `/`-terminated for directories.
fn entry_key(native: &str, is_dir: bool) -> String {
    let cleaned = path::clean(native);
    let key = &cleaned[1..];
    if key.is_empty() {
        String::new()
    } else if is_dir {
        format!("{}/", key)
    } else {
        key.to_string()
    }
}

struct Located<'a, H> {
    index: usize,
    path: String,
    header: Option<&'a H>,
    is_dir: bool,
}

/// A read-only filesystem over an archive's sorted entry table.
///
/// The table and the reopen function are all that is retained; the archive
/// file itself is reopened for every member that is read.
pub struct ArchiveFs<F: ArchiveFormat> {
    name: String,
    format: Arc<F>,
    reopen: Reopen,
    table: Vec<Entry<F::Header>>,
    tracer: Tracer,
}

impl<F: ArchiveFormat> ArchiveFs<F> {
    /// Index the archive produced by `reopen`.
    pub fn open(
        name: impl Into<String>,
        format: F,
        reopen: Reopen,
        tracer: Tracer,
    ) -> Result<Self> {
        let name = name.into();
        let source = reopen()?;
        let headers = format.read_headers(source)?;

        let mut table: Vec<Entry<F::Header>> = headers
            .into_iter()
            .filter_map(|header| {
                let key = entry_key(header.native_name(), header.is_dir());
                (!key.is_empty()).then_some(Entry { key, header })
            })
            .collect();
        table.sort_by(|a, b| a.key.cmp(&b.key));
        log::debug!("{}({}): indexed {} entries", format.label(), name, table.len());

        Ok(Self {
            name,
            format: Arc::new(format),
            reopen,
            table,
            tracer,
        })
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Smallest index of an exact match for `target`, or of an entry below
    /// `target/`. The flag reports an exact match.
    fn lookup(&self, target: &str) -> Option<(usize, bool)> {
        let i = self.table.partition_point(|e| e.key.as_str() < target);
        if i < self.table.len() && self.table[i].key == target {
            return Some((i, true));
        }

        // The directory run, if any, sorts after `target` itself.
        let dir = format!("{}/", target);
        let rest = &self.table[i..];
        let j = rest.partition_point(|e| e.key.as_str() < dir.as_str());
        if j < rest.len() && rest[j].key.starts_with(&dir) {
            return Some((i + j, false));
        }
        None
    }

    fn locate(&self, abspath: &str) -> Result<Located<'_, F::Header>> {
        let cleaned = path::clean(abspath);
        if cleaned == "/" {
            return Ok(Located {
                index: 0,
                path: cleaned,
                header: None,
                is_dir: true,
            });
        }

        let target = &cleaned[1..];
        match self.lookup(target) {
            None => Err(Error::NotExist(cleaned)),
            Some((index, true)) => Ok(Located {
                index,
                header: Some(&self.table[index].header),
                is_dir: false,
                path: cleaned,
            }),
            Some((index, false)) => {
                // `target/` itself is present when the archive stores the directory.
                let entry = &self.table[index];
                let header = (entry.key.len() == target.len() + 1).then_some(&entry.header);
                Ok(Located {
                    index,
                    header,
                    is_dir: true,
                    path: cleaned,
                })
            }
        }
    }

    fn record(name: &str, header: Option<&F::Header>, is_dir: bool) -> FileRecord {
        match header {
            None => FileRecord::directory(name),
            Some(h) if is_dir => FileRecord::directory(name)
                .with_mod_time(h.mod_time())
                .with_permissions(h.mode())
                .read_only(),
            Some(h) => FileRecord::file(name, h.size(), h.mod_time(), h.mode()).read_only(),
        }
    }
}

impl<F: ArchiveFormat> FileSystem for ArchiveFs<F> {
    fn stat(&self, abspath: &str) -> Result<FileRecord> {
        self.tracer.trace(self, format_args!("Stat({:?})", abspath));
        let found = self.locate(abspath)?;
        Ok(Self::record(
            path::base_name(&found.path),
            found.header,
            found.is_dir,
        ))
    }

    fn read_dir(&self, abspath: &str) -> Result<Vec<FileRecord>> {
        self.tracer.trace(self, format_args!("Readdir({:?})", abspath));
        let found = self.locate(abspath)?;
        if !found.is_dir {
            return Err(Error::NotADirectory(found.path));
        }

        let dirname = if found.path == "/" {
            String::new()
        } else {
            format!("{}/", &found.path[1..])
        };

        let mut list = Vec::new();
        let mut prev: Option<&str> = None;
        for entry in &self.table[found.index..] {
            let Some(local) = entry.key.strip_prefix(dirname.as_str()) else {
                break;
            };
            if local.is_empty() {
                continue;
            }

            // x/y yields a directory entry x; x/ is x's own header.
            let (name, header, is_dir) = match local.find('/') {
                Some(i) if i + 1 == local.len() => (&local[..i], Some(&entry.header), true),
                Some(i) => (&local[..i], None, true),
                None => (local, Some(&entry.header), false),
            };
            if prev == Some(name) {
                continue;
            }
            prev = Some(name);
            list.push(Self::record(name, header, is_dir));
        }

        // Keys of stored directories end in `/`, which can sort them after
        // siblings such as `docs-old`.
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    fn open(&self, abspath: &str) -> Result<Box<dyn VfsFile>> {
        self.tracer.trace(self, format_args!("Open({:?})", abspath));
        let found = self.locate(abspath)?;
        let header = match found.header {
            Some(header) if !found.is_dir => header.clone(),
            _ => return Err(Error::IsADirectory(found.path)),
        };

        let stream = MemberStream::open(
            format!("{}({}){}", self.format.label(), self.name, found.path),
            Arc::clone(&self.format),
            Arc::clone(&self.reopen),
            header,
        )?;
        Ok(Box::new(stream))
    }
}

impl<F: ArchiveFormat> fmt::Display for ArchiveFs<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.format.label(), self.name)
    }
}

/// Forward-only stream over one archive member.
///
/// `seek(SeekFrom::Start(0))` drops the decoder and reopens the archive
/// from scratch; every other seek fails with [`Error::UnsupportedSeek`].
/// If the reopen fails, reads keep failing until a later rewind succeeds.
/// A stream must not be driven from several threads at once.
pub struct MemberStream<F: ArchiveFormat> {
    label: String,
    format: Arc<F>,
    reopen: Reopen,
    header: F::Header,
    reader: Box<dyn Read + Send>,
    /// Set by a failed rewind; reads fail until a rewind succeeds.
    failed: Option<io::ErrorKind>,
}

impl<F: ArchiveFormat> MemberStream<F> {
    fn open(label: String, format: Arc<F>, reopen: Reopen, header: F::Header) -> Result<Self> {
        let reader = format.open_member(reopen()?, &header)?;
        Ok(Self {
            label,
            format,
            reopen,
            header,
            reader,
            failed: None,
        })
    }

    fn reopen_member(&self) -> Result<Box<dyn Read + Send>> {
        let source = (self.reopen)()?;
        self.format.open_member(source, &self.header)
    }
}

impl<F: ArchiveFormat> Read for MemberStream<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.failed {
            return Err(io::Error::new(
                kind,
                format!("{}: stream lost after failed rewind", self.label),
            ));
        }
        self.reader.read(buf)
    }
}

impl<F: ArchiveFormat> Seek for MemberStream<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(0) => match self.reopen_member() {
                Ok(reader) => {
                    self.reader = reader;
                    self.failed = None;
                    Ok(0)
                }
                Err(err) => {
                    let err = io::Error::from(err);
                    self.failed = Some(err.kind());
                    Err(err)
                }
            },
            _ => Err(Error::UnsupportedSeek(self.label.clone()).into()),
        }
    }
}

impl<F: ArchiveFormat> VfsFile for MemberStream<F> {
    fn is_seekable(&self) -> bool {
        false
    }
}
