//! Audit sinks.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;

/// Destination for serialized audit records.
pub trait AuditSink: Send + Sync {
    /// Persist one JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SinkWrite`] if the record could not be
    /// persisted. The emitter surfaces this on standard error; it is never
    /// silently dropped.
    fn append(&self, line: &str) -> AuditResult<()>;
}

/// Appends newline-delimited JSON to a file, fsyncing each record.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileSink {
    /// Open (or create) the audit log at `path` in append mode.
    ///
    /// On Unix the file is restricted to mode 0600.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SinkWrite`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuditError::SinkWrite(format!("create {}: {e}", parent.display())))?;
        }
        let file = open_append(&path)
            .map_err(|e| AuditError::SinkWrite(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileSink {
    fn append(&self, line: &str) -> AuditResult<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| AuditError::SinkWrite("sink lock poisoned".to_owned()))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.sync_data())
            .map_err(|e| AuditError::SinkWrite(format!("append {}: {e}", self.path.display())))
    }
}

#[cfg(unix)]
fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new().append(true).create(true).open(path)
}

/// In-memory sink for tests and pre-init capture.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines, parsed back into events.
    ///
    /// Lines that fail to parse are skipped; tests always write through
    /// [`AuditEvent::to_json_line`] so this is lossless in practice.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.lines
            .lock()
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|l| serde_json::from_str(l).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All captured raw lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemorySink {
    fn append(&self, line: &str) -> AuditResult<()> {
        self.lines
            .lock()
            .map_err(|_| AuditError::SinkWrite("sink lock poisoned".to_owned()))?
            .push(line.to_owned());
        Ok(())
    }
}

/// Last-resort sink that writes to standard error.
///
/// Used before the real sink is installed so that pre-init events are
/// never lost silently.
#[derive(Default)]
pub struct StderrSink;

impl AuditSink for StderrSink {
    fn append(&self, line: &str) -> AuditResult<()> {
        eprintln!("{line}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditEvent, AuditKind};
    use rigrun_core::SessionId;

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = FileSink::open(&path).unwrap();

        let event = AuditEvent::new(AuditKind::PolicyLoaded, SessionId::new());
        sink.append(&event.to_json_line().unwrap()).unwrap();
        sink.append(&event.to_json_line().unwrap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        for line in content.lines() {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["event_type"], "POLICY_LOADED");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_file_sink_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let _ = FileSink::open(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_sink_captures() {
        let sink = MemorySink::new();
        let event = AuditEvent::new(AuditKind::AuthLockout, SessionId::new());
        sink.append(&event.to_json_line().unwrap()).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditKind::AuthLockout);
    }
}
