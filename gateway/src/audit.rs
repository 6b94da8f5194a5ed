//! Audit logging contract boundary.
//!
//! Audit-archive format and role-scoped access to it are named but not
//! specified at field level (spec §9, open question). This fixes the
//! interface the middleware chain calls — one record per request, after
//! the handler returns — behind a trait so a durable archival sink can
//! replace the file-append default without touching the chain.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// One audited request/response pair.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub client_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub timestamp: String,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Appends one JSON line per entry to `<dir>/audit.log`. Write failures are
/// logged, not propagated — audit logging must never fail a request.
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl FileAuditSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let mut path = dir.into();
        path.push("audit.log");
        Self { path, file: Mutex::new(None) }
    }

    fn with_file<F: FnOnce(&mut std::fs::File)>(&self, f: F) {
        let mut guard = self.file.lock().expect("audit file mutex poisoned");
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(err) => {
                    tracing::error!(error = %err, path = %self.path.display(), "failed to open audit log");
                    return;
                }
            }
        }
        if let Some(file) = guard.as_mut() {
            f(file);
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, entry: AuditEntry) {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize audit entry");
                return;
            }
        };
        self.with_file(|file| {
            if let Err(err) = writeln!(file, "{line}") {
                tracing::error!(error = %err, "failed to append audit entry");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_append_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileAuditSink::new(dir.path());
        sink.record(AuditEntry {
            client_id: "c1".to_string(),
            method: "GET".to_string(),
            path: "/api/orders".to_string(),
            status: 200,
            timestamp: "2025-01-15T10:30:00.000Z".to_string(),
        });
        let contents = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert!(contents.contains("\"client_id\":\"c1\""));
        assert_eq!(contents.lines().count(), 1);
    }
}
