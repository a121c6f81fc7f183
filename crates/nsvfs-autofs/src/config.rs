use nsvfs_core::{Preference, Tracer};
use secrecy::SecretString;

/// What a directory listing does when probing an archive fails with
/// anything other than "unsupported format".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeErrorPolicy {
    /// Log a warning and list the entry as a plain file.
    #[default]
    SkipEntry,
    /// Fail the whole listing with the probe error.
    FailListing,
}

/// Configuration for an [`Autofs`](crate::Autofs) namespace.
#[derive(Debug, Clone)]
pub struct AutofsConfig {
    /// Tracer handed to the namespace and to every mounted archive.
    pub tracer: Tracer,
    /// How probe failures are handled during `read_dir`.
    pub probe_errors: ProbeErrorPolicy,
    /// Password tried when opening RAR archives.
    pub rar_password: Option<SecretString>,
    /// Preferred-binding predicate for union listings.
    pub preference: Option<Preference>,
}

impl Default for AutofsConfig {
    fn default() -> Self {
        Self {
            tracer: Tracer::disabled(),
            probe_errors: ProbeErrorPolicy::SkipEntry,
            rar_password: None,
            preference: None,
        }
    }
}
