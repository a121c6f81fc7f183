use nsvfs_autofs::{Autofs, AutofsConfig, ProbeErrorPolicy};
use nsvfs_core::{BindMode, Error, FileRecord, FileSystem, OsFs, Result, Scope, VfsFile};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, contents) in entries {
        let options = SimpleFileOptions::default().unix_permissions(0o644);
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn read_all(fs: &dyn FileSystem, name: &str) -> String {
    let mut file = fs.open(name).unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    contents
}

fn listing(fs: &dyn FileSystem, dir: &str) -> Vec<(String, bool)> {
    fs.read_dir(dir)
        .unwrap()
        .into_iter()
        .map(|r| (r.name, r.is_dir))
        .collect()
}

fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_zip(&temp.path().join("data.zip"), &[("readme.txt", "hello from zip")]);
    fs::write(temp.path().join("notes.txt"), "plain").unwrap();
    temp
}

#[test]
fn archives_become_directories_when_listed() {
    let temp = fixture();
    let autofs = Autofs::new(temp.path(), AutofsConfig::default()).unwrap();

    assert_eq!(
        listing(&autofs, "/"),
        vec![("data.zip".to_string(), true), ("notes.txt".to_string(), false)]
    );
    assert_eq!(
        listing(&autofs, "/data.zip"),
        vec![("readme.txt".to_string(), false)]
    );
    assert_eq!(read_all(&autofs, "/data.zip/readme.txt"), "hello from zip");
    assert_eq!(read_all(&autofs, "/notes.txt"), "plain");
    assert_eq!(autofs.mounted(), vec!["/data.zip".to_string()]);
}

#[test]
fn stat_routes_into_mounted_archives_only() {
    let temp = fixture();
    let autofs = Autofs::new(temp.path(), AutofsConfig::default()).unwrap();

    // Stat never mounts.
    assert!(!autofs.stat("/data.zip").unwrap().is_dir);
    assert!(autofs.stat("/data.zip/readme.txt").is_err());
    assert!(autofs.mounted().is_empty());

    autofs.read_dir("/").unwrap();
    let archive = autofs.stat("/data.zip").unwrap();
    assert!(archive.is_dir);
    assert_eq!(archive.name, "data.zip");
    assert_eq!(archive.size, fs::metadata(temp.path().join("data.zip")).unwrap().len());

    let member = autofs.lstat("/data.zip/readme.txt").unwrap();
    assert_eq!(member.size, "hello from zip".len() as u64);
    assert!(autofs.stat("/data.zip/missing").unwrap_err().is_not_exist());
    assert!(matches!(autofs.open("/data.zip"), Err(Error::IsADirectory(_))));
}

#[test]
fn broken_archive_stays_a_file() {
    let temp = fixture();
    fs::write(temp.path().join("broken.zip"), "definitely not a zip").unwrap();
    let autofs = Autofs::new(temp.path(), AutofsConfig::default()).unwrap();

    let root = listing(&autofs, "/");
    assert!(root.contains(&("broken.zip".to_string(), false)));
    assert!(root.contains(&("data.zip".to_string(), true)));
    assert_eq!(read_all(&autofs, "/broken.zip"), "definitely not a zip");

    // Probed again on the next listing, still a file.
    assert!(listing(&autofs, "/").contains(&("broken.zip".to_string(), false)));
    assert_eq!(autofs.mounted(), vec!["/data.zip".to_string()]);
}

#[test]
fn extension_match_ignores_case() {
    let temp = TempDir::new().unwrap();
    write_zip(&temp.path().join("ARCHIVE.ZIP"), &[("x/y.txt", "upper")]);
    let autofs = Autofs::new(temp.path(), AutofsConfig::default()).unwrap();

    assert_eq!(
        listing(&autofs, "/"),
        vec![("ARCHIVE.ZIP".to_string(), true)]
    );
    assert_eq!(read_all(&autofs, "/ARCHIVE.ZIP/x/y.txt"), "upper");
}

#[test]
fn archives_in_subdirectories_mount_on_their_own_listing() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();
    write_zip(&temp.path().join("sub/inner.zip"), &[("a.txt", "inner")]);
    let autofs = Autofs::new(temp.path(), AutofsConfig::default()).unwrap();

    assert_eq!(listing(&autofs, "/"), vec![("sub".to_string(), true)]);
    assert!(autofs.mounted().is_empty());

    assert_eq!(
        listing(&autofs, "/sub"),
        vec![("inner.zip".to_string(), true)]
    );
    assert_eq!(read_all(&autofs, "/sub/inner.zip/a.txt"), "inner");
}

#[test]
fn archive_file_as_root() {
    let temp = fixture();
    let autofs = Autofs::new(temp.path().join("data.zip"), AutofsConfig::default()).unwrap();

    assert_eq!(
        listing(&autofs, "/"),
        vec![("readme.txt".to_string(), false)]
    );
    assert_eq!(read_all(&autofs, "/readme.txt"), "hello from zip");

    let err = Autofs::new(temp.path().join("notes.txt"), AutofsConfig::default()).unwrap_err();
    assert!(err.is_unsupported_format(), "{:?}", err);
}

/// Lists one archive name but refuses to open anything.
struct LockedFs;

impl FileSystem for LockedFs {
    fn stat(&self, path: &str) -> Result<FileRecord> {
        match path {
            "/" => Ok(FileRecord::directory("/")),
            _ => Ok(FileRecord::file("locked.zip", 100, None, 0o600)),
        }
    }

    fn read_dir(&self, _path: &str) -> Result<Vec<FileRecord>> {
        Ok(vec![FileRecord::file("locked.zip", 100, None, 0o600)])
    }

    fn open(&self, _path: &str) -> Result<Box<dyn VfsFile>> {
        Err(Error::Io(io::Error::from(io::ErrorKind::PermissionDenied)))
    }
}

impl fmt::Display for LockedFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("locked")
    }
}

fn locked_scope() -> Scope {
    let mut scope = Scope::new();
    scope.bind("/", "/", Arc::new(LockedFs), BindMode::Replace);
    scope
}

#[test]
fn probe_errors_skip_the_entry_by_default() {
    let autofs = Autofs::from_scope(locked_scope(), AutofsConfig::default());
    assert_eq!(
        listing(&autofs, "/"),
        vec![("locked.zip".to_string(), false)]
    );
    assert!(autofs.mounted().is_empty());
}

#[test]
fn probe_errors_can_fail_the_listing() {
    let config = AutofsConfig {
        probe_errors: ProbeErrorPolicy::FailListing,
        ..AutofsConfig::default()
    };
    let autofs = Autofs::from_scope(locked_scope(), config);

    match autofs.read_dir("/") {
        Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::PermissionDenied),
        other => panic!("unexpected {:?}", other),
    }
}

/// Counts every open that reaches the host.
struct CountingFs {
    inner: OsFs,
    opens: AtomicUsize,
}

impl FileSystem for CountingFs {
    fn stat(&self, path: &str) -> Result<FileRecord> {
        self.inner.stat(path)
    }

    fn read_dir(&self, path: &str) -> Result<Vec<FileRecord>> {
        self.inner.read_dir(path)
    }

    fn open(&self, path: &str) -> Result<Box<dyn VfsFile>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(path)
    }
}

impl fmt::Display for CountingFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "counting({})", self.inner)
    }
}

#[test]
fn concurrent_listings_mount_once() {
    let temp = fixture();
    let counting = Arc::new(CountingFs {
        inner: OsFs::new(temp.path()),
        opens: AtomicUsize::new(0),
    });
    let mut scope = Scope::new();
    scope.bind("/", "/", counting.clone(), BindMode::Replace);
    let autofs = Arc::new(Autofs::from_scope(scope, AutofsConfig::default()));

    std::thread::scope(|s| {
        for _ in 0..8 {
            let autofs = Arc::clone(&autofs);
            s.spawn(move || {
                let root = autofs.read_dir("/").unwrap();
                assert!(root.iter().any(|r| r.name == "data.zip" && r.is_dir));
            });
        }
    });

    assert_eq!(counting.opens.load(Ordering::SeqCst), 1);
    assert_eq!(autofs.mounted(), vec!["/data.zip".to_string()]);
}
