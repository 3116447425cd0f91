//! The audit emitter and the process-wide handle.
//!
//! Initialization is two-phase: until a real sink is installed, events go
//! to a fallback file under the rigrun home (plaintext JSON lines), or to
//! standard error if even that is unavailable. `install_global_sink` then
//! swaps the sink atomically; no event is lost across the swap.

use std::sync::{Arc, OnceLock, RwLock};

use tracing::warn;

use crate::event::AuditEvent;
use crate::sink::{AuditSink, FileSink, StderrSink};

/// Emits audit events to a swappable sink.
pub struct AuditEmitter {
    sink: RwLock<Arc<dyn AuditSink>>,
}

impl AuditEmitter {
    /// Create an emitter over the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink: RwLock::new(sink),
        }
    }

    /// Replace the sink. Events emitted after this call go to `sink`.
    pub fn set_sink(&self, sink: Arc<dyn AuditSink>) {
        if let Ok(mut guard) = self.sink.write() {
            *guard = sink;
        }
    }

    /// Emit one event.
    ///
    /// A sink failure is reported on standard error; it is never silently
    /// swallowed and never panics the caller.
    pub fn emit(&self, event: AuditEvent) {
        let line = match event.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                eprintln!("rigrun-audit: failed to serialize event: {e}");
                return;
            },
        };

        let sink = match self.sink.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(_) => {
                eprintln!("rigrun-audit: sink lock poisoned; event follows:\n{line}");
                return;
            },
        };

        if let Err(e) = sink.append(&line) {
            warn!(error = %e, "audit sink write failed");
            eprintln!("rigrun-audit: sink write failed ({e}); event follows:\n{line}");
        }
    }
}

static GLOBAL: OnceLock<Arc<AuditEmitter>> = OnceLock::new();

/// The process-wide emitter.
///
/// Before [`install_global_sink`] runs, events land in the fallback log
/// under the rigrun home, or on standard error if the home cannot be
/// resolved. Prefer constructor injection in new code; this handle is
/// compatibility glue for the singleton consumers.
pub fn global() -> Arc<AuditEmitter> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(AuditEmitter::new(preinit_sink()))))
}

/// Install the real sink on the process-wide emitter.
pub fn install_global_sink(sink: Arc<dyn AuditSink>) {
    global().set_sink(sink);
}

/// Pre-init sink: the fallback file if the home resolves, stderr otherwise.
fn preinit_sink() -> Arc<dyn AuditSink> {
    if let Ok(home) = rigrun_core::RigrunHome::resolve()
        && home.ensure().is_ok()
        && let Ok(sink) = FileSink::open(home.audit_fallback_path())
    {
        return Arc::new(sink);
    }
    Arc::new(StderrSink)
}
