//! # nsvfs-core
//!
//! Read-only virtual filesystem contract and namespace composition.
//!
//! This crate provides:
//! - The [`FileSystem`] contract (stat, lstat, read_dir, open) and the
//!   [`VfsFile`] stream it hands out
//! - [`FileRecord`], the uniform stat result
//! - [`OsFs`], a passthrough to a host directory
//! - [`Scope`], a Plan9-style namespace built from bind mounts with union
//!   directory listings
//! - [`Tracer`], injectable per-call diagnostics
//!
//! ## Example
//!
//! ```ignore
//! use nsvfs_core::{BindMode, FileSystem, OsFs, Scope};
//! use std::sync::Arc;
//!
//! let mut scope = Scope::new();
//! scope.bind("/", "/", Arc::new(OsFs::new("/srv/base")), BindMode::Replace);
//! scope.bind("/", "/", Arc::new(OsFs::new("/srv/overrides")), BindMode::Before);
//!
//! for record in scope.read_dir("/")? {
//!     println!("{} {}", record.mode_string(), record.name);
//! }
//! ```

mod empty;
mod error;
mod fs;
mod os;
pub mod path;
mod record;
mod scope;
mod trace;

pub use empty::EmptyFs;
pub use error::{Error, Result};
pub use fs::{FileSystem, VfsFile};
pub use os::{OsFile, OsFs};
pub use record::{FileRecord, MODE_DIR, MODE_PERM};
pub use scope::{chroot, BindMode, Binding, Preference, Scope};
pub use trace::{Tracer, TRACE_TARGET};
