#![cfg(feature = "rar")]

use chrono::{Datelike, Timelike};
use nsvfs_archive::{rarfs, zipfs, ArchiveFormat};
use nsvfs_core::{FileSystem, OsFs, Tracer, VfsFile};
use secrecy::SecretString;
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// RAR 4 archive with stored members, made on a Unix host:
/// `dir/`, `dir/nested.txt`, a symlink `link -> top.txt` and `top.txt`,
/// all dated 2021-03-14 12:30:00.
const SAMPLE_RAR: &[u8] = &[
    0x52, 0x61, 0x72, 0x21, 0x1a, 0x07, 0x00, 0xcf, 0x90, 0x73, 0x00, 0x00,
    0x0d, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x8e, 0x74, 0xe0,
    0x80, 0x23, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03,
    0x00, 0x00, 0x00, 0x00, 0xc0, 0x63, 0x6e, 0x52, 0x14, 0x30, 0x03, 0x00,
    0xed, 0x41, 0x00, 0x00, 0x64, 0x69, 0x72, 0x96, 0x85, 0x74, 0x00, 0x80,
    0x2e, 0x00, 0x11, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x03, 0x3a,
    0x07, 0x8a, 0xbb, 0xc0, 0x63, 0x6e, 0x52, 0x14, 0x30, 0x0e, 0x00, 0xa4,
    0x81, 0x00, 0x00, 0x64, 0x69, 0x72, 0x2f, 0x6e, 0x65, 0x73, 0x74, 0x65,
    0x64, 0x2e, 0x74, 0x78, 0x74, 0x6e, 0x65, 0x73, 0x74, 0x65, 0x64, 0x20,
    0x72, 0x61, 0x72, 0x20, 0x6d, 0x65, 0x6d, 0x62, 0x65, 0x72, 0x39, 0x94,
    0x74, 0x00, 0x80, 0x24, 0x00, 0x07, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00,
    0x00, 0x03, 0x5c, 0x28, 0xa0, 0x26, 0xc0, 0x63, 0x6e, 0x52, 0x14, 0x30,
    0x04, 0x00, 0xff, 0xa1, 0x00, 0x00, 0x6c, 0x69, 0x6e, 0x6b, 0x74, 0x6f,
    0x70, 0x2e, 0x74, 0x78, 0x74, 0x31, 0xa6, 0x74, 0x00, 0x80, 0x27, 0x00,
    0x09, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x03, 0x73, 0xda, 0x81,
    0xf5, 0xc0, 0x63, 0x6e, 0x52, 0x14, 0x30, 0x07, 0x00, 0xa4, 0x81, 0x00,
    0x00, 0x74, 0x6f, 0x70, 0x2e, 0x74, 0x78, 0x74, 0x74, 0x6f, 0x70, 0x20,
    0x6c, 0x65, 0x76, 0x65, 0x6c, 0xc4, 0x3d, 0x7b, 0x00, 0x40, 0x07, 0x00,
];

fn read_all(fs: &dyn FileSystem, name: &str) -> String {
    let mut file = fs.open(name).unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    contents
}

fn names(fs: &dyn FileSystem, dir: &str) -> Vec<String> {
    fs.read_dir(dir).unwrap().into_iter().map(|r| r.name).collect()
}

#[test]
fn rar_members_resolve_list_and_read() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sample.rar");
    fs::write(&path, SAMPLE_RAR).unwrap();
    let fs = rarfs::open(&path, None, Tracer::disabled()).unwrap();

    // The symlink is left out of the index.
    assert_eq!(fs.len(), 3);
    assert_eq!(names(&fs, "/"), vec!["dir", "top.txt"]);
    assert_eq!(names(&fs, "/dir"), vec!["nested.txt"]);
    assert!(fs.stat("/link").unwrap_err().is_not_exist());

    let dir = fs.stat("/dir").unwrap();
    assert!(dir.is_dir);
    assert_eq!(dir.permissions(), 0o555);

    let top = fs.stat("/top.txt").unwrap();
    assert!(!top.is_dir);
    assert_eq!(top.size, 9);
    assert_eq!(top.permissions(), 0o444);
    let mtime = top.mod_time.unwrap();
    assert_eq!((mtime.year(), mtime.month(), mtime.day()), (2021, 3, 14));
    assert_eq!(mtime.minute(), 30);

    assert_eq!(fs.stat("/dir/nested.txt").unwrap().size, 17);
    assert_eq!(read_all(&fs, "/dir/nested.txt"), "nested rar member");
    assert_eq!(read_all(&fs, "/top.txt"), "top level");
}

#[test]
fn rar_member_rewinds() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sample.rar");
    fs::write(&path, SAMPLE_RAR).unwrap();
    let fs = rarfs::open(&path, None, Tracer::disabled()).unwrap();

    let mut file = fs.open("/dir/nested.txt").unwrap();
    for _ in 0..2 {
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "nested rar member");
        assert_eq!(file.seek(SeekFrom::Start(0)).unwrap(), 0);
    }
    assert!(file.seek(SeekFrom::Start(4)).is_err());
}

#[test]
fn rar_inside_zip_is_spooled_and_read() {
    let temp = TempDir::new().unwrap();
    let outer = temp.path().join("outer.zip");
    let mut zip = ZipWriter::new(File::create(&outer).unwrap());
    zip.start_file("inner.rar", SimpleFileOptions::default()).unwrap();
    zip.write_all(SAMPLE_RAR).unwrap();
    zip.finish().unwrap();

    let zip_fs: Arc<dyn FileSystem> = Arc::new(zipfs::open(&outer, Tracer::disabled()).unwrap());
    assert!(zip_fs.open("/inner.rar").unwrap().host_path().is_none());

    // A password is accepted for an archive that is not encrypted.
    let password = Some(SecretString::new("hunter2".to_string()));
    let fs = rarfs::open_in(zip_fs, "/inner.rar", password, Tracer::disabled()).unwrap();
    assert_eq!(names(&fs, "/"), vec!["dir", "top.txt"]);
    assert_eq!(read_all(&fs, "/dir/nested.txt"), "nested rar member");
}

#[test]
fn rar_opened_through_host_filesystem() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("SAMPLE.RAR"), SAMPLE_RAR).unwrap();
    let host: Arc<dyn FileSystem> = Arc::new(OsFs::new(temp.path()));

    let fs = rarfs::open_in(host, "SAMPLE.RAR", None, Tracer::disabled()).unwrap();
    assert_eq!(read_all(&fs, "/top.txt"), "top level");
    assert_eq!(fs.to_string(), "rarfs(/SAMPLE.RAR)");
}

#[test]
fn missing_rar_does_not_exist() {
    let temp = TempDir::new().unwrap();
    let err = rarfs::open(temp.path().join("absent.rar"), None, Tracer::disabled())
        .err()
        .unwrap();
    assert!(err.is_not_exist(), "{:?}", err);
}

#[test]
fn garbage_rar_is_unsupported_format() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("broken.rar"), vec![0x42u8; 512]).unwrap();

    let err = rarfs::open(temp.path().join("broken.rar"), None, Tracer::disabled())
        .err()
        .unwrap();
    assert!(err.is_unsupported_format(), "{:?}", err);

    let host: Arc<dyn FileSystem> = Arc::new(OsFs::new(temp.path()));
    let password = Some(SecretString::new("hunter2".to_string()));
    let err = rarfs::open_in(host, "/broken.rar", password, Tracer::disabled())
        .err()
        .unwrap();
    assert!(err.is_unsupported_format(), "{:?}", err);
}

#[test]
fn sources_without_host_path_are_spooled() {
    let source: Box<dyn VfsFile> = Box::new(Cursor::new(b"Rar!garbage".to_vec()));
    let err = rarfs::RarFormat::default()
        .read_headers(source)
        .unwrap_err();
    assert!(err.is_unsupported_format(), "{:?}", err);
}
