//! Plan9-style bind namespace.
//!
//! A [`Scope`] maps cleaned absolute mount points to an ordered chain of
//! [`Binding`]s. Lookups resolve the longest registered ancestor of a path
//! and try its bindings in order; directory listings union the results.

use crate::empty::EmptyFs;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, VfsFile};
use crate::path;
use crate::record::FileRecord;
use crate::trace::Tracer;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Where a new binding goes relative to the existing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Discard every binding previously resolving for the mount point.
    Replace,
    /// Try the new binding first, then the existing chain.
    Before,
    /// Try the existing chain first, then the new binding.
    After,
}

/// Requests under `root` are translated to `base` in `fs`.
#[derive(Clone)]
pub struct Binding {
    root: String,
    base: String,
    fs: Arc<dyn FileSystem>,
}

impl Binding {
    /// Namespace path this binding is anchored at.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Path inside [`Binding::fs`] that `root` maps to.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The bound filesystem.
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Translate a namespace path below `root` into `fs` coordinates.
    ///
    /// `Binding { root: "/src/pkg", base: "/src" }` maps `/src/pkg/code` to `/src/code`.
    pub fn translate(&self, name: &str) -> String {
        let name = path::clean(name);
        debug_assert!(
            path::has_path_prefix(&name, &self.root),
            "translate {} outside {}",
            name,
            self.root
        );
        path::join(&self.base, &name[self.root.len()..])
    }

    /// Re-file this binding under `root`, a descendant of its current root.
    fn reanchor(&mut self, root: &str) {
        if self.root == root {
            return;
        }
        if !path::has_path_prefix(root, &self.root) {
            panic!(
                "invalid bind: root={:?} binding{{{:?}, {:?}, {}}}",
                root, self.root, self.base, self.fs
            );
        }
        let suffix = &root[self.root.len()..];
        self.base = path::join(&self.base, suffix);
        self.root = path::join(&self.root, suffix);
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("root", &self.root)
            .field("base", &self.base)
            .field("fs", &self.fs.to_string())
            .finish()
    }
}

/// Predicate choosing the preferred binding of a directory union.
#[derive(Clone)]
pub struct Preference(Arc<dyn Fn(&FileRecord) -> bool + Send + Sync>);

impl Preference {
    /// Prefer the first binding listing an entry matching `predicate`.
    pub fn new(predicate: impl Fn(&FileRecord) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Prefer the first binding listing a file whose name ends in `suffix`.
    pub fn suffix(suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        Self::new(move |record| !record.is_dir && record.name.ends_with(&suffix))
    }

    fn matches(&self, record: &FileRecord) -> bool {
        (self.0)(record)
    }
}

impl fmt::Debug for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Preference(..)")
    }
}

/// A namespace composed of bound filesystems.
///
/// The root `/` always resolves to at least one binding. Binds require
/// `&mut self`; a populated scope is safe to share for reads.
#[derive(Clone)]
pub struct Scope {
    mounts: BTreeMap<String, Vec<Binding>>,
    preference: Option<Preference>,
    tracer: Tracer,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Create a scope with an empty directory bound at `/`.
    pub fn new() -> Self {
        let mut scope = Self {
            mounts: BTreeMap::new(),
            preference: None,
            tracer: Tracer::disabled(),
        };
        scope.bind("/", "/", Arc::new(EmptyFs), BindMode::Replace);
        scope
    }

    /// Trace every call through `tracer`.
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    /// Use `preference` to pick the preferred binding when merging listings.
    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.preference = Some(preference);
        self
    }

    /// Redirect references to `root` to the path `base` in `fs`.
    ///
    /// With [`BindMode::Before`] and [`BindMode::After`] the chain currently
    /// resolving for `root` (possibly inherited from an ancestor) is kept and
    /// re-anchored at `root`.
    pub fn bind(&mut self, root: &str, base: &str, fs: Arc<dyn FileSystem>, mode: BindMode) {
        let root = path::clean(root);
        let base = path::clean(base);
        self.tracer.trace(
            &*self,
            format_args!("Bind({:?}, {:?}, {}, {:?})", root, base, fs, mode),
        );

        let binding = Binding {
            root: root.clone(),
            base,
            fs,
        };
        let mut chain = match mode {
            BindMode::Replace => vec![binding],
            BindMode::Before => {
                let mut chain = vec![binding];
                chain.extend(self.resolve(&root).iter().cloned());
                chain
            }
            BindMode::After => {
                let mut chain = self.resolve(&root).to_vec();
                chain.push(binding);
                chain
            }
        };
        for binding in &mut chain {
            binding.reanchor(&root);
        }

        self.mounts.insert(root, chain);
    }

    /// Bindings anchored at the longest registered ancestor of `name`.
    pub fn resolve(&self, name: &str) -> &[Binding] {
        let mut name = path::clean(name);
        loop {
            if let Some(chain) = self.mounts.get(&name) {
                return chain;
            }
            if name == "/" {
                return &[];
            }
            name = path::parent(&name);
        }
    }

    /// Registered mount points in path order.
    pub fn mount_points(&self) -> impl Iterator<Item = &str> {
        self.mounts.keys().map(String::as_str)
    }

    /// Try each binding in order; the first success wins.
    ///
    /// A "not exist" from an earlier binding must not mask a genuine error
    /// from a later one.
    fn first_success<T>(
        &self,
        name: &str,
        op: impl Fn(&dyn FileSystem, &str) -> Result<T>,
    ) -> Result<T> {
        let mut failure: Option<Error> = None;
        for binding in self.resolve(name) {
            match op(binding.fs.as_ref(), &binding.translate(name)) {
                Ok(value) => return Ok(value),
                Err(err) => prefer_error(&mut failure, err),
            }
        }
        Err(failure.unwrap_or_else(|| Error::NotExist(path::clean(name))))
    }
}

fn prefer_error(slot: &mut Option<Error>, err: Error) {
    match slot {
        Some(prev) if !prev.is_not_exist() || err.is_not_exist() => {}
        _ => *slot = Some(err),
    }
}

impl FileSystem for Scope {
    fn stat(&self, name: &str) -> Result<FileRecord> {
        self.tracer.trace(self, format_args!("Stat({:?})", name));
        self.first_success(name, |fs, translated| fs.stat(translated))
    }

    fn lstat(&self, name: &str) -> Result<FileRecord> {
        self.tracer.trace(self, format_args!("Lstat({:?})", name));
        self.first_success(name, |fs, translated| fs.lstat(translated))
    }

    fn open(&self, name: &str) -> Result<Box<dyn VfsFile>> {
        self.tracer.trace(self, format_args!("Open({:?})", name));
        self.first_success(name, |fs, translated| fs.open(translated))
    }

    fn read_dir(&self, name: &str) -> Result<Vec<FileRecord>> {
        let name = path::clean(name);
        self.tracer.trace(self, format_args!("Readdir({:?})", name));

        let mut have_preferred = false;
        let mut seen: HashSet<String> = HashSet::new();
        let mut all: Vec<FileRecord> = Vec::new();
        let mut first: Option<Vec<FileRecord>> = None;
        let mut failure: Option<Error> = None;

        for binding in self.resolve(&name) {
            let dir = match binding.fs.read_dir(&binding.translate(&name)) {
                Ok(dir) => dir,
                Err(err) => {
                    failure.get_or_insert(err);
                    continue;
                }
            };

            // Take every entry of the first binding matching the preference,
            // only subdirectories of the others.
            let mut use_files = false;
            if !have_preferred {
                if let Some(preference) = &self.preference {
                    if dir.iter().any(|d| preference.matches(d)) {
                        use_files = true;
                        have_preferred = true;
                    }
                }
            }

            for d in &dir {
                if (d.is_dir || use_files) && !seen.contains(&d.name) {
                    seen.insert(d.name.clone());
                    all.push(d.clone());
                }
            }

            if first.is_none() {
                first = Some(dir);
            }
        }

        if !have_preferred {
            for d in first.iter().flatten() {
                if !seen.contains(&d.name) {
                    seen.insert(d.name.clone());
                    all.push(d.clone());
                }
            }
        }

        // Make empty but bound subtrees reachable.
        for mount in self.mounts.keys() {
            if mount == &name || !path::has_path_prefix(mount, &name) {
                continue;
            }
            let rest = mount[name.len()..].trim_start_matches('/');
            let elem = rest.split('/').next().unwrap_or(rest);
            if !elem.is_empty() && !seen.contains(elem) {
                seen.insert(elem.to_string());
                all.push(FileRecord::directory(elem));
            }
        }

        if all.is_empty() && first.is_none() {
            if let Some(err) = failure {
                return Err(err);
            }
        }

        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scope")
    }
}

/// Make every lookup in `fs` relative to `root`.
pub fn chroot(root: &str, fs: Arc<dyn FileSystem>) -> Scope {
    let mut scope = Scope::new();
    scope.bind("/", root, fs, BindMode::Replace);
    scope
}
