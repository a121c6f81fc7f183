//! # nsvfs-autofs
//!
//! A namespace that transparently mounts archive files as directories.
//!
//! This crate provides:
//! - [`Autofs`], rooted at a host directory or at a single archive file
//! - [`AutofsConfig`] for tracing, RAR passwords and probe error handling
//! - The `nsvfs-tree` binary (with the `cli` feature)
//!
//! ## Example
//!
//! ```ignore
//! use nsvfs_autofs::{Autofs, AutofsConfig};
//! use nsvfs_core::FileSystem;
//! use std::io::Read;
//!
//! let fs = Autofs::new("/srv/data", AutofsConfig::default())?;
//!
//! // data.zip shows up as a directory once its parent is listed.
//! fs.read_dir("/")?;
//! let mut readme = String::new();
//! fs.open("/data.zip/readme.txt")?.read_to_string(&mut readme)?;
//! ```

mod autofs;
mod config;

pub use autofs::Autofs;
pub use config::{AutofsConfig, ProbeErrorPolicy};

// Re-export secrecy for callers supplying RAR passwords
pub use secrecy::SecretString;
