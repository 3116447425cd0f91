//! Prelude module - commonly used types for convenient import.
//!
//! Use `use rigrun_audit::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use rigrun_audit::prelude::*;
//! use rigrun_core::SessionId;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let emitter = AuditEmitter::new(sink.clone());
//! emitter.emit(AuditEvent::new(AuditKind::PolicyLoaded, SessionId::new()));
//! assert_eq!(sink.events().len(), 1);
//! ```

// Errors
pub use crate::{AuditError, AuditResult};

// Events
pub use crate::{AuditEvent, AuditKind};

// Emission
pub use crate::{AuditEmitter, global, install_global_sink};

// Sinks
pub use crate::{AuditSink, FileSink, MemorySink, StderrSink};
