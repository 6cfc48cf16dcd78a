//! Shared timestamp/identifier helpers for durable records and CLI envelopes.

use chrono::{SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Returns the current UTC time as RFC3339 with second precision
/// (e.g. `2026-08-05T14:03:12Z`).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact timestamp used as a backup file suffix (e.g. `20260805_140312`).
pub fn backup_stamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Proposal ids are ULID-based: unique and lexicographically time-ordered,
/// so generation order is preserved when sorting by id.
pub fn new_proposal_id() -> String {
    format!("prop_{}", Ulid::new())
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_iso(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_format() {
        let result = now_iso();
        assert!(result.ends_with('Z'));
        assert!(result.contains('T'));
    }

    #[test]
    fn test_backup_stamp_shape() {
        let stamp = backup_stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.chars().nth(8), Some('_'));
    }

    #[test]
    fn test_new_event_id_is_unique() {
        let id1 = new_event_id();
        let id2 = new_event_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_proposal_id_prefix() {
        let id = new_proposal_id();
        assert!(id.starts_with("prop_"));
        assert!(Ulid::from_string(id.trim_start_matches("prop_")).is_ok());
    }

    #[test]
    fn test_command_envelope_basic() {
        let envelope = command_envelope("test", "ok", serde_json::json!({}));
        assert_eq!(envelope["cmd"], "test");
        assert_eq!(envelope["status"], "ok");
        assert!(envelope["ts"].is_string());
        assert!(envelope["event_id"].is_string());
        assert_eq!(envelope["envelope_version"], "1.0.0");
    }

    #[test]
    fn test_command_envelope_with_extra() {
        let extra = serde_json::json!({"key": "value", "count": 42});
        let envelope = command_envelope("test", "ok", extra);
        assert_eq!(envelope["key"], "value");
        assert_eq!(envelope["count"], 42);
    }
}
