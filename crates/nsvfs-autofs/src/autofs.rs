use crate::config::{AutofsConfig, ProbeErrorPolicy};
use log::{debug, warn};
use nsvfs_archive::ArchiveKind;
use nsvfs_core::{
    path, BindMode, Error, FileRecord, FileSystem, OsFs, Result, Scope, VfsFile,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A namespace that mounts archive files as directories when they are listed.
///
/// Listing a directory probes every file with a `.zip`, `.tar` or `.rar`
/// extension. Archives that open are remembered in an overlay map keyed by
/// their namespace path, and later calls below that path are answered by the
/// archive. Mounts are never removed.
pub struct Autofs {
    scope: Arc<Scope>,
    overlay: Mutex<HashMap<String, Arc<dyn FileSystem>>>,
    config: AutofsConfig,
}

/// Overlay hit for a path.
struct Routed {
    fs: Arc<dyn FileSystem>,
    /// Path inside the archive, rooted.
    inner: String,
    /// The path names the archive file itself.
    exact: bool,
}

impl Autofs {
    /// Build a namespace rooted at a host directory, or at a single archive
    /// file which is then mounted as `/`.
    pub fn new(root: impl AsRef<Path>, config: AutofsConfig) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let meta = std::fs::metadata(&root)
            .map_err(|e| Error::from_io(e, root.display().to_string()))?;

        let mut scope = Scope::new().with_tracer(config.tracer.clone());
        if let Some(preference) = &config.preference {
            scope = scope.with_preference(preference.clone());
        }

        if meta.is_dir() {
            let os = OsFs::with_tracer(&root, config.tracer.clone());
            scope.bind("/", "/", Arc::new(os), BindMode::Replace);
        } else {
            let archive = Self::open_root_archive(&root, &config)?;
            scope.bind("/", "/", archive, BindMode::Replace);
        }

        Ok(Self::from_scope(scope, config))
    }

    /// Read an archive file through its parent directory, so the archive
    /// never resolves through the namespace it becomes the root of.
    fn open_root_archive(file: &Path, config: &AutofsConfig) -> Result<Arc<dyn FileSystem>> {
        let display = file.display().to_string();
        let (Some(parent), Some(name)) = (file.parent(), file.file_name()) else {
            return Err(Error::UnsupportedFormat(display));
        };
        let name = format!("/{}", name.to_string_lossy());
        let kind = ArchiveKind::from_name(&name).ok_or(Error::UnsupportedFormat(display))?;

        let host: Arc<dyn FileSystem> = Arc::new(OsFs::with_tracer(parent, config.tracer.clone()));
        kind.open_in(
            host,
            &name,
            config.rar_password.clone(),
            config.tracer.clone(),
        )
    }

    /// Layer auto-mounting over an existing namespace.
    pub fn from_scope(scope: Scope, config: AutofsConfig) -> Self {
        Self {
            scope: Arc::new(scope),
            overlay: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The namespace below the overlay.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Namespace paths of every mounted archive, sorted.
    pub fn mounted(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.overlay.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Find the mounted archive containing `cleaned`, walking up from the
    /// path itself.
    fn route(&self, cleaned: &str) -> Option<Routed> {
        let overlay = self.overlay.lock();
        if overlay.is_empty() {
            return None;
        }

        let mut candidate = cleaned.to_string();
        while candidate != "/" {
            if let Some(fs) = overlay.get(&candidate) {
                let inner = match &cleaned[candidate.len()..] {
                    "" => "/".to_string(),
                    rest => rest.to_string(),
                };
                return Some(Routed {
                    fs: Arc::clone(fs),
                    exact: inner == "/",
                    inner,
                });
            }
            candidate = path::parent(&candidate);
        }
        None
    }

    /// Try to mount the file at `full`; reports whether it is now a directory.
    fn probe(
        &self,
        overlay: &mut HashMap<String, Arc<dyn FileSystem>>,
        full: &str,
        kind: ArchiveKind,
    ) -> Result<bool> {
        let scope: Arc<dyn FileSystem> = Arc::clone(&self.scope) as Arc<dyn FileSystem>;
        match kind.open_in(
            scope,
            full,
            self.config.rar_password.clone(),
            self.config.tracer.clone(),
        ) {
            Ok(fs) => {
                debug!("autofs: mounted {} archive at {}", kind, full);
                overlay.insert(full.to_string(), fs);
                Ok(true)
            }
            Err(err) if err.is_unsupported_format() => {
                debug!("autofs: {} is not a {} archive: {}", full, kind, err);
                Ok(false)
            }
            Err(err) => match self.config.probe_errors {
                ProbeErrorPolicy::SkipEntry => {
                    warn!("autofs: failed to probe {}: {}", full, err);
                    Ok(false)
                }
                ProbeErrorPolicy::FailListing => Err(err),
            },
        }
    }

    fn stat_with(
        &self,
        name: &str,
        op: impl Fn(&dyn FileSystem, &str) -> Result<FileRecord>,
    ) -> Result<FileRecord> {
        let cleaned = path::clean(name);
        match self.route(&cleaned) {
            Some(routed) if routed.exact => {
                let mut record = op(self.scope.as_ref(), &cleaned)?;
                record.mark_directory();
                Ok(record)
            }
            Some(routed) => op(routed.fs.as_ref(), &routed.inner),
            None => op(self.scope.as_ref(), &cleaned),
        }
    }
}

impl FileSystem for Autofs {
    fn stat(&self, name: &str) -> Result<FileRecord> {
        self.config
            .tracer
            .trace(self, format_args!("Stat({:?})", name));
        self.stat_with(name, |fs, p| fs.stat(p))
    }

    fn lstat(&self, name: &str) -> Result<FileRecord> {
        self.config
            .tracer
            .trace(self, format_args!("Lstat({:?})", name));
        self.stat_with(name, |fs, p| fs.lstat(p))
    }

    fn read_dir(&self, name: &str) -> Result<Vec<FileRecord>> {
        self.config
            .tracer
            .trace(self, format_args!("Readdir({:?})", name));
        let cleaned = path::clean(name);
        if let Some(routed) = self.route(&cleaned) {
            return routed.fs.read_dir(&routed.inner);
        }

        let mut records = self.scope.read_dir(&cleaned)?;

        // Held across the probes so each archive is mounted once.
        let mut overlay = self.overlay.lock();
        for record in records.iter_mut().filter(|r| !r.is_dir) {
            let full = path::join(&cleaned, &record.name);
            if overlay.contains_key(&full) {
                record.mark_directory();
                continue;
            }
            let Some(kind) = ArchiveKind::from_name(&record.name) else {
                continue;
            };
            if self.probe(&mut overlay, &full, kind)? {
                record.mark_directory();
            }
        }

        Ok(records)
    }

    fn open(&self, name: &str) -> Result<Box<dyn VfsFile>> {
        self.config
            .tracer
            .trace(self, format_args!("Open({:?})", name));
        let cleaned = path::clean(name);
        match self.route(&cleaned) {
            Some(routed) if routed.exact => Err(Error::IsADirectory(cleaned)),
            Some(routed) => routed.fs.open(&routed.inner),
            None => self.scope.open(&cleaned),
        }
    }
}

impl fmt::Display for Autofs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("autofs")
    }
}

impl fmt::Debug for Autofs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autofs")
            .field("mounted", &self.mounted())
            .field("config", &self.config)
            .finish()
    }
}
