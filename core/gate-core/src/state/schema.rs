//! Parsing, sanitizing, and type-checking raw state documents.
//!
//! # Absence Is Not Corruption
//!
//! The validator keeps three outcomes apart:
//!
//! | Raw input                         | Outcome                     |
//! |-----------------------------------|-----------------------------|
//! | no file                           | [`Validated::Absent`]       |
//! | file present, parses, types check | [`Validated::Valid`]        |
//! | file present, anything else       | [`Validated::Corrupt`]      |
//!
//! What `Corrupt` means is decided per kind by [`corruption_policy`]:
//! enforcement kinds fail closed (the gate stays up until a human cancels it
//! or the TTL runs out), advisory kinds fail open.

use serde_json::Value;

use super::kinds::StateKind;
use super::records::{RecordHeader, StateRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    Absent,
    Valid(T),
    Corrupt { reason: String },
}

impl<T> Validated<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Validated::Valid(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Validated::Corrupt { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionPolicy {
    /// Treat an unreadable file as a still-active gate.
    FailClosed,
    /// Treat an unreadable file as no state at all.
    FailOpen,
}

pub fn corruption_policy(kind: StateKind) -> CorruptionPolicy {
    if kind.is_enforcement() {
        CorruptionPolicy::FailClosed
    } else {
        CorruptionPolicy::FailOpen
    }
}

/// Validates `raw` as a `T` belonging to `session_id`.
///
/// On success the record's `sessionId` is re-stamped to `session_id`, so a file
/// that bled over from another session can never claim a foreign identity.
pub fn validate<T: StateRecord>(raw: Option<&str>, session_id: &str) -> Validated<T> {
    let value = match check_shape(raw) {
        Ok(Some(value)) => value,
        Ok(None) => return Validated::Absent,
        Err(reason) => return corrupt(T::KIND, reason),
    };

    let mut record: T = match serde_json::from_value(value) {
        Ok(record) => record,
        Err(err) => return corrupt(T::KIND, format!("schema mismatch: {}", err)),
    };

    let header = record.header_mut();
    if header.session_id != session_id {
        if !header.session_id.is_empty() {
            tracing::debug!(
                kind = %T::KIND,
                stored = %header.session_id,
                caller = %session_id,
                "Re-stamping record with caller session"
            );
        }
        header.session_id = session_id.to_string();
    }
    record.sanitize();

    Validated::Valid(record)
}

/// Header-only validation, for sweeps that do not care about kind payloads.
pub fn validate_header(raw: Option<&str>) -> Validated<RecordHeader> {
    let value = match check_shape(raw) {
        Ok(Some(value)) => value,
        Ok(None) => return Validated::Absent,
        Err(reason) => return Validated::Corrupt { reason },
    };
    match serde_json::from_value(value) {
        Ok(header) => Validated::Valid(header),
        Err(err) => Validated::Corrupt {
            reason: format!("schema mismatch: {}", err),
        },
    }
}

fn check_shape(raw: Option<&str>) -> Result<Option<Value>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Err("empty file".to_string());
    }

    let value: Value =
        serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {}", err))?;
    let Some(object) = value.as_object() else {
        return Err("top level is not an object".to_string());
    };
    match object.get("active") {
        Some(Value::Bool(_)) => {}
        Some(_) => return Err("`active` is not a boolean".to_string()),
        None => return Err("missing `active`".to_string()),
    }
    for field in ["activatedAt", "lastActivity"] {
        match object.get(field) {
            None | Some(Value::Null) => {}
            Some(v) if v.is_i64() => {}
            Some(_) => return Err(format!("`{}` is not an epoch-ms integer", field)),
        }
    }

    Ok(Some(value))
}

fn corrupt<T>(kind: StateKind, reason: String) -> Validated<T> {
    tracing::warn!(kind = %kind, reason = %reason, "Corrupt state record");
    Validated::Corrupt { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::records::{PlanApprovalMarker, TestRunMarker};

    #[test]
    fn none_is_absent() {
        assert_eq!(
            validate::<TestRunMarker>(None, "s1"),
            Validated::Absent
        );
    }

    #[test]
    fn valid_record_is_restamped() {
        let raw = r#"{"active":true,"activatedAt":10,"sessionId":"other","command":"cargo test"}"#;
        let record = validate::<TestRunMarker>(Some(raw), "mine").valid().unwrap();
        assert_eq!(record.header.session_id, "mine");
        assert_eq!(record.command.as_deref(), Some("cargo test"));
        assert_eq!(record.header.effective_activity(), 10);
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let raw = r#"{"active":false,"surprise":[1,2,3]}"#;
        let record = validate::<PlanApprovalMarker>(Some(raw), "s").valid().unwrap();
        let reserialized = serde_json::to_value(&record).unwrap();
        assert!(reserialized.get("surprise").is_none());
    }

    #[test]
    fn corrupt_inputs_are_distinguished_from_absence() {
        let cases = [
            "",
            "   ",
            "{not json",
            "[1,2]",
            r#"{"activatedAt":1}"#,
            r#"{"active":"yes"}"#,
            r#"{"active":true,"lastActivity":"2024-01-01T00:00:00Z"}"#,
            r#"{"active":true,"lastActivity":1.5}"#,
            r#"{"active":true,"passed":"maybe"}"#,
        ];
        for raw in cases {
            assert!(
                validate::<TestRunMarker>(Some(raw), "s").is_corrupt(),
                "expected corrupt: {raw:?}"
            );
        }
    }

    #[test]
    fn null_timestamps_are_accepted_as_missing() {
        let raw = r#"{"active":true,"lastActivity":null,"activatedAt":null}"#;
        let record = validate::<TestRunMarker>(Some(raw), "s").valid().unwrap();
        assert_eq!(record.header.effective_activity(), 0);
    }

    #[test]
    fn policy_is_asymmetric() {
        assert_eq!(
            corruption_policy(StateKind::Delegation),
            CorruptionPolicy::FailClosed
        );
        assert_eq!(
            corruption_policy(StateKind::Orchestration),
            CorruptionPolicy::FailClosed
        );
        assert_eq!(
            corruption_policy(StateKind::PlanApproval),
            CorruptionPolicy::FailOpen
        );
        assert_eq!(
            corruption_policy(StateKind::TestRun),
            CorruptionPolicy::FailOpen
        );
    }

    #[test]
    fn header_validation_ignores_payload() {
        let raw = r#"{"active":true,"lastActivity":5,"tasks":"whatever"}"#;
        let header = validate_header(Some(raw)).valid().unwrap();
        assert!(header.active);
        assert_eq!(header.last_activity, Some(5));
    }
}
