//! nsvfs-tree: Print the auto-mounting namespace rooted at a directory or archive.
//!
//! Archives found while walking are mounted and descended into, so the
//! output shows their contents as ordinary directories.
//!
//! # Usage
//!
//! ```bash
//! # Walk a directory, descending into any zip/tar/rar files
//! nsvfs-tree ~/Downloads
//!
//! # Walk a single archive with per-call tracing
//! nsvfs-tree --trace bundle.zip
//! ```

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use nsvfs_autofs::{Autofs, AutofsConfig, ProbeErrorPolicy, SecretString};
use nsvfs_core::{path, FileRecord, FileSystem, Tracer};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

/// Print every entry of an auto-mounting namespace.
///
/// Directories print their child count in the size column.
#[derive(Parser, Debug)]
#[command(name = "nsvfs-tree")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory or archive to walk
    #[arg(value_name = "ROOT")]
    root: PathBuf,

    /// Log every filesystem call
    #[arg(long)]
    trace: bool,

    /// Password for RAR archives
    #[arg(long)]
    password: Option<String>,

    /// Abort when an archive fails to open instead of listing it as a file
    #[arg(long)]
    strict: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn mtime(record: &FileRecord) -> String {
    match record.mod_time {
        Some(t) => t.format("%b %d %H:%M").to_string(),
        None => "Jan 01 00:00".to_string(),
    }
}

/// Print `records`, the listing of `dir`, and recurse into subdirectories.
///
/// Each directory is listed once; the listing gives both the child count
/// and the entries to descend into.
fn walk(
    fs: &dyn FileSystem,
    dir: &str,
    records: Vec<FileRecord>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for record in records {
        let full = path::join(dir, &record.name);
        if record.is_dir {
            let children = fs
                .read_dir(&full)
                .with_context(|| format!("listing {}", full))?;
            writeln!(
                out,
                "{} {:>10} {} {}/",
                record.mode_string(),
                children.len(),
                mtime(&record),
                full
            )?;
            walk(fs, &full, children, out)?;
        } else {
            writeln!(
                out,
                "{} {:>10} {} {}",
                record.mode_string(),
                record.size,
                mtime(&record),
                full
            )?;
        }
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = AutofsConfig {
        tracer: if args.trace {
            Tracer::to_log()
        } else {
            Tracer::disabled()
        },
        probe_errors: if args.strict {
            ProbeErrorPolicy::FailListing
        } else {
            ProbeErrorPolicy::SkipEntry
        },
        rar_password: args.password.map(SecretString::new),
        ..AutofsConfig::default()
    };

    info!("Opening namespace: {}", args.root.display());
    let fs = Autofs::new(&args.root, config)
        .with_context(|| format!("opening {}", args.root.display()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let root = fs.read_dir("/").context("listing /")?;
    walk(&fs, "/", root, &mut out)?;
    out.flush()?;

    info!("Mounted archives: {}", fs.mounted().len());
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose || args.trace {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsvfs_core::{OsFs, Result, VfsFile};
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingFs {
        inner: OsFs,
        listings: AtomicUsize,
    }

    impl FileSystem for CountingFs {
        fn stat(&self, path: &str) -> Result<FileRecord> {
            self.inner.stat(path)
        }

        fn read_dir(&self, path: &str) -> Result<Vec<FileRecord>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.inner.read_dir(path)
        }

        fn open(&self, path: &str) -> Result<Box<dyn VfsFile>> {
            self.inner.open(path)
        }
    }

    impl fmt::Display for CountingFs {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("counting")
        }
    }

    #[test]
    fn walk_lists_each_directory_once() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a/b")).unwrap();
        std::fs::write(temp.path().join("a/b/leaf.txt"), "leaf").unwrap();
        std::fs::write(temp.path().join("top.txt"), "top").unwrap();
        let fs = CountingFs {
            inner: OsFs::new(temp.path()),
            listings: AtomicUsize::new(0),
        };

        let root = fs.read_dir("/").unwrap();
        let mut out = Vec::new();
        walk(&fs, "/", root, &mut out).unwrap();

        // "/", "/a" and "/a/b"
        assert_eq!(fs.listings.load(Ordering::SeqCst), 3);
        let text = String::from_utf8(out).unwrap();
        let paths: Vec<_> = text
            .lines()
            .map(|line| line.rsplit(' ').next().unwrap())
            .collect();
        assert_eq!(paths, vec!["/a/", "/a/b/", "/a/b/leaf.txt", "/top.txt"]);
    }
}
