//! Append-only mutation audit log.
//!
//! Every operation that mutates durable state records a one-line event here,
//! so a store's history of writes stays legible after the fact. The log is
//! never read back by the core; it exists for operators and diagnostics.

use crate::core::error::MoltError;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuditEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub status: String,
}

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join("audit.events.jsonl"),
        }
    }

    pub fn record(&self, op: &str, status: &str) -> Result<(), MoltError> {
        let event = AuditEvent {
            ts: time::now_iso(),
            event_id: time::new_event_id(),
            op: op.to_string(),
            status: status.to_string(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(MoltError::IoError)?;
        writeln!(file, "{}", serde_json::to_string(&event).map_err(MoltError::JsonError)?)
            .map_err(MoltError::IoError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_events() {
        let tmp = tempfile::tempdir().unwrap();
        let log = AuditLog::new(tmp.path());
        log.record("skills.record", "success").unwrap();
        log.record("evolve.apply", "error").unwrap();

        let content = std::fs::read_to_string(tmp.path().join("audit.events.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.op, "skills.record");
        assert_eq!(first.status, "success");
    }
}
