//! Event handler for host hooks.
//!
//! Reads one JSON event from stdin, asks the engine, and always answers with
//! exactly one JSON object on stdout.
//!
//! ## Event Mapping
//!
//! ```text
//! SessionStart            → maybe sweep, list resumable archives as context
//! SessionEnd              → archive unfinished workflows, delete the rest
//! UserPromptSubmit        → classify prompt, apply orchestration intent
//! PreToolUse  edit tools  → file-edit decision
//! PreToolUse  Bash        → command decision
//! PreToolUse  Task        → agent-spawn decision
//! PostToolUse Bash        → test-run marker (verification commands only)
//! ```
//!
//! A denial prints `{"decision":"block","reason":...}`; an allow prints `{}`.

use std::io::{self, Read, Write};

use gate_core::clock::Clock;
use gate_core::workflow::policy::is_verification_command;
use gate_core::{Applied, Decision, GateEngine, Verdict};
use serde::Serialize;

use crate::commands::HookError;
use crate::input::{HookEvent, HookInput, ToolCall};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: &'static str,
    pub additional_context: String,
}

impl HookResponse {
    pub fn allow() -> Self {
        Self::default()
    }

    fn context(event: &'static str, text: String) -> Self {
        Self {
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event,
                additional_context: text,
            }),
            ..Self::default()
        }
    }

    fn from_verdict(verdict: Verdict) -> Self {
        let system_message = (!verdict.warnings.is_empty()).then(|| verdict.warnings.join("\n"));
        match verdict.decision {
            Decision::Allow => Self {
                system_message,
                ..Self::default()
            },
            Decision::Deny(denial) => Self {
                decision: Some("block"),
                reason: Some(denial.to_string()),
                system_message,
                ..Self::default()
            },
        }
    }
}

pub fn run() -> Result<(), HookError> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(HookError::Stdin)?;

    if input.trim().is_empty() {
        return emit(&HookResponse::allow());
    }

    let hook_input: HookInput = serde_json::from_str(&input)?;
    let engine = GateEngine::new();
    emit(&respond(&engine, &hook_input))
}

pub fn emit(response: &HookResponse) -> Result<(), HookError> {
    let json = serde_json::to_string(response)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json).map_err(HookError::Output)
}

pub fn respond<C: Clock>(engine: &GateEngine<C>, input: &HookInput) -> HookResponse {
    let Some(event) = input.to_event() else {
        return HookResponse::allow();
    };
    let session_id = input.session();

    match event {
        HookEvent::SessionStart => {
            let start = engine.start_session();
            if let Some(stats) = &start.sweep {
                tracing::debug!(removed = stats.total_removed(), "Sweep ran at session start");
            }
            match start.summary {
                Some(summary) => HookResponse::context("SessionStart", summary),
                None => HookResponse::allow(),
            }
        }

        HookEvent::SessionEnd => {
            let report = engine.end_session(session_id);
            for error in &report.errors {
                tracing::warn!(session = %session_id, error = %error, "Session end left state behind");
            }
            HookResponse::allow()
        }

        HookEvent::UserPromptSubmit { prompt } => {
            match engine.classify_and_apply(session_id, &prompt) {
                Some((intent, Applied::Persisted { record, .. })) => {
                    tracing::info!(session = %session_id, intent = ?intent, phase = %record.phase(), "Orchestration advanced");
                    HookResponse::context(
                        "UserPromptSubmit",
                        format!("Orchestration is now in the {} phase.", record.phase()),
                    )
                }
                Some((_, Applied::Deleted)) => HookResponse::context(
                    "UserPromptSubmit",
                    "Orchestration cancelled; edits are no longer gated by it.".to_string(),
                ),
                Some((intent, Applied::NoOp { reason })) => {
                    tracing::debug!(intent = ?intent, reason = %reason, "Intent ignored");
                    HookResponse::allow()
                }
                None => HookResponse::allow(),
            }
        }

        HookEvent::PreToolUse(call) => {
            let verdict = match call {
                ToolCall::FileEdit { path } => engine.check_file_edit(session_id, &path),
                ToolCall::Command { command } => engine.check_command(session_id, &command),
                ToolCall::AgentSpawn { agent_type } => {
                    engine.check_agent_spawn(session_id, &agent_type)
                }
                ToolCall::Other { .. } => Verdict::allow(),
            };
            if let Some(denial) = verdict.decision.denial() {
                tracing::info!(session = %session_id, blocked = %denial.blocked, "Blocked tool use");
            }
            HookResponse::from_verdict(verdict)
        }

        HookEvent::PostToolUse {
            call: ToolCall::Command { command },
            exit_code,
        } if is_verification_command(&command) => {
            engine.record_test_run(session_id, &command, exit_code.map(|code| code == 0));
            HookResponse::allow()
        }

        HookEvent::PostToolUse { .. } => HookResponse::allow(),

        HookEvent::Unknown { event_name } => {
            tracing::debug!(event_name = %event_name, "Unhandled event");
            HookResponse::allow()
        }
    }
}
