//! Serialized record types shared by every state kind.
//!
//! On-disk documents are camelCase JSON. Every kind flattens a [`RecordHeader`]
//! into its top level:
//!
//! ```json
//! { "active": true, "activatedAt": 1700000000000, "lastActivity": 1700000300000,
//!   "sessionId": "abc", "lastActivityISO": "2023-11-14T22:18:20+00:00", ... }
//! ```
//!
//! `lastActivityISO` is written for humans reading the file. Nothing parses it.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::kinds::StateKind;
use crate::clock::to_iso;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHeader {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<i64>,
    #[serde(default)]
    pub session_id: String,
    #[serde(
        default,
        rename = "lastActivityISO",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_activity_iso: Option<String>,
}

impl RecordHeader {
    /// Header for a record activated at `now_ms`.
    pub fn activated(session_id: &str, now_ms: i64) -> Self {
        Self {
            active: true,
            activated_at: Some(now_ms),
            last_activity: Some(now_ms),
            session_id: session_id.to_string(),
            last_activity_iso: Some(to_iso(now_ms)),
        }
    }

    /// `lastActivity ?? activatedAt ?? 0`.
    pub fn effective_activity(&self) -> i64 {
        self.last_activity.or(self.activated_at).unwrap_or(0)
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_activity = Some(now_ms);
        self.last_activity_iso = Some(to_iso(now_ms));
    }
}

/// A typed state document stored under one [`StateKind`].
pub trait StateRecord: Serialize + DeserializeOwned + Clone + Debug {
    const KIND: StateKind;

    fn header(&self) -> &RecordHeader;
    fn header_mut(&mut self) -> &mut RecordHeader;

    /// Identifier shown when offering to resume an archived workflow.
    fn workflow_id(&self) -> Option<&str> {
        None
    }

    /// Active and not finished, so worth archiving at session end.
    fn is_incomplete(&self) -> bool {
        false
    }

    /// Kind-specific repair applied after a successful parse.
    fn sanitize(&mut self) {}
}

/// Advisory marker left when an orchestration plan is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanApprovalMarker {
    #[serde(flatten)]
    pub header: RecordHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
}

impl PlanApprovalMarker {
    pub fn new(session_id: &str, workflow_id: Option<String>, now_ms: i64) -> Self {
        Self {
            header: RecordHeader::activated(session_id, now_ms),
            workflow_id,
            approved_at: Some(now_ms),
        }
    }
}

impl StateRecord for PlanApprovalMarker {
    const KIND: StateKind = StateKind::PlanApproval;

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }
}

/// Advisory marker for the most recent verification command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunMarker {
    #[serde(flatten)]
    pub header: RecordHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    #[serde(default)]
    pub run_count: u32,
}

impl StateRecord for TestRunMarker {
    const KIND: StateKind = StateKind::TestRun;

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_activity_falls_back_in_order() {
        let mut header = RecordHeader::activated("s", 100);
        header.last_activity = Some(200);
        assert_eq!(header.effective_activity(), 200);

        header.last_activity = None;
        assert_eq!(header.effective_activity(), 100);

        header.activated_at = None;
        assert_eq!(header.effective_activity(), 0);
    }

    #[test]
    fn header_serializes_camel_case_with_iso_display() {
        let header = RecordHeader::activated("s1", 0);
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["activatedAt"], 0);
        assert_eq!(json["lastActivity"], 0);
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["lastActivityISO"], "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn marker_flattens_header() {
        let marker = PlanApprovalMarker::new("s1", Some("wf".into()), 5);
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["active"], true);
        assert_eq!(json["workflowId"], "wf");
        assert!(json.get("header").is_none());
    }
}
