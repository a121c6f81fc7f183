use chrono::{DateTime, Utc};

/// Directory bit of [`FileRecord::mode`], matching `S_IFDIR`.
pub const MODE_DIR: u32 = 0o040000;

/// Permission bits of [`FileRecord::mode`].
pub const MODE_PERM: u32 = 0o777;

const WRITE_BITS: u32 = 0o222;

/// Uniform stat result returned by every filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Directory-local name, not the full path.
    pub name: String,
    /// Size in bytes, 0 for synthetic directories.
    pub size: u64,
    /// Last modification time, if the backing entry records one.
    pub mod_time: Option<DateTime<Utc>>,
    /// Directory bit plus permission bits.
    pub mode: u32,
    /// Whether this entry is a directory.
    pub is_dir: bool,
}

impl FileRecord {
    /// Create a record for a regular file.
    pub fn file(
        name: impl Into<String>,
        size: u64,
        mod_time: Option<DateTime<Utc>>,
        perm: u32,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            mod_time,
            mode: perm & MODE_PERM,
            is_dir: false,
        }
    }

    /// Create a synthetic directory with no backing header.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mod_time: None,
            mode: MODE_DIR | 0o555,
            is_dir: true,
        }
    }

    /// Set the modification time.
    pub fn with_mod_time(mut self, mod_time: Option<DateTime<Utc>>) -> Self {
        self.mod_time = mod_time;
        self
    }

    /// Replace the permission bits, keeping the directory bit.
    pub fn with_permissions(mut self, perm: u32) -> Self {
        self.mode = (self.mode & !MODE_PERM) | (perm & MODE_PERM);
        self
    }

    /// Strip all write bits.
    pub fn read_only(mut self) -> Self {
        self.mode &= !WRITE_BITS;
        self
    }

    /// Turn this record into a directory, keeping name, size and mod_time.
    pub fn mark_directory(&mut self) {
        self.is_dir = true;
        self.mode = MODE_DIR | 0o555;
    }

    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.mode & MODE_PERM
    }

    /// Render the mode the way `ls -l` does, e.g. `dr-xr-xr-x`.
    pub fn mode_string(&self) -> String {
        let mut out = String::with_capacity(10);
        out.push(if self.is_dir { 'd' } else { '-' });
        for shift in [6u32, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        out
    }
}
