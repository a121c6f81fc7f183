//! Injectable per-call diagnostics.

use std::fmt;
use std::sync::Arc;

/// Log target used by [`Tracer::to_log`].
pub const TRACE_TARGET: &str = "nsvfs::trace";

type Sink = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-call diagnostic tracer handed to each filesystem constructor.
///
/// A default tracer is disabled and costs one branch per call. When enabled
/// every traced call produces one `vfs <label>: <message>` line.
#[derive(Clone, Default)]
pub struct Tracer {
    sink: Option<Sink>,
}

impl Tracer {
    /// A tracer that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A tracer that forwards lines to the `log` facade at debug level.
    pub fn to_log() -> Self {
        Self::with_sink(|line| log::debug!(target: TRACE_TARGET, "{}", line))
    }

    /// A tracer that hands each line to `sink`.
    pub fn with_sink(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// Whether traced calls produce output.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit one line attributed to `fs`.
    pub fn trace(&self, fs: &dyn fmt::Display, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.sink {
            sink(&format!("vfs {}: {}", fs, args));
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
