//! Rigrun Audit - Structured audit event emission.
//!
//! This crate provides:
//! - Flat, newline-delimited JSON audit records ([`AuditEvent`])
//! - The event-type vocabulary the core emits ([`AuditKind`])
//! - Pluggable sinks ([`AuditSink`], [`FileSink`], [`MemorySink`])
//! - A process-wide emitter with two-phase initialization
//!
//! # Failure handling
//!
//! A sink error is never swallowed: the emitter writes a best-effort
//! diagnostic to standard error. Sensitive metadata values (API keys,
//! HMAC keys, policy keys) are replaced with `[REDACTED]` before any
//! stringification.
//!
//! # Example
//!
//! ```
//! use rigrun_audit::{AuditEmitter, AuditEvent, AuditKind, MemorySink};
//! use rigrun_core::SessionId;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let emitter = AuditEmitter::new(sink.clone());
//!
//! emitter.emit(
//!     AuditEvent::new(AuditKind::RoutingDecision, SessionId::new())
//!         .with_metadata("reason", "trivial query served from cache"),
//! );
//!
//! assert_eq!(sink.events().len(), 1);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod emitter;
mod error;
mod event;
mod sink;

pub use emitter::{AuditEmitter, global, install_global_sink};
pub use error::{AuditError, AuditResult};
pub use event::{AuditEvent, AuditKind};
pub use sink::{AuditSink, FileSink, MemorySink, StderrSink};
