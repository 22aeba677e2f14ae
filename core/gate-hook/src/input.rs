//! Hook event payloads as the host sends them on stdin.

use serde::Deserialize;
use serde_json::Value;

/// Raw hook payload. Unknown fields are ignored; every field is optional so a
/// malformed event degrades to "nothing to do" instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    SessionStart,
    SessionEnd,
    UserPromptSubmit { prompt: String },
    PreToolUse(ToolCall),
    PostToolUse { call: ToolCall, exit_code: Option<i64> },
    Unknown { event_name: String },
}

/// The part of a tool invocation the gate cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    FileEdit { path: String },
    Command { command: String },
    AgentSpawn { agent_type: String },
    Other { tool_name: String },
}

const EDIT_TOOLS: [&str; 4] = ["Edit", "Write", "MultiEdit", "NotebookEdit"];
const AGENT_TOOLS: [&str; 2] = ["Task", "Agent"];

impl HookInput {
    /// Session id as sent; empty when missing. The engine sanitizes it.
    pub fn session(&self) -> &str {
        self.session_id.as_deref().unwrap_or("")
    }

    pub fn to_event(&self) -> Option<HookEvent> {
        let name = self.hook_event_name.as_deref()?;
        let event = match name {
            "SessionStart" => HookEvent::SessionStart,
            "SessionEnd" => HookEvent::SessionEnd,
            "UserPromptSubmit" => HookEvent::UserPromptSubmit {
                prompt: self.prompt.clone().unwrap_or_default(),
            },
            "PreToolUse" => HookEvent::PreToolUse(self.tool_call()),
            "PostToolUse" => HookEvent::PostToolUse {
                call: self.tool_call(),
                exit_code: self.exit_code(),
            },
            other => HookEvent::Unknown {
                event_name: other.to_string(),
            },
        };
        Some(event)
    }

    fn input_str(&self, key: &str) -> Option<String> {
        self.tool_input
            .as_ref()?
            .get(key)?
            .as_str()
            .map(str::to_string)
    }

    fn tool_call(&self) -> ToolCall {
        let tool_name = self.tool_name.clone().unwrap_or_default();
        let call = if EDIT_TOOLS.contains(&tool_name.as_str()) {
            self.input_str("file_path")
                .or_else(|| self.input_str("notebook_path"))
                .map(|path| ToolCall::FileEdit { path })
        } else if tool_name == "Bash" {
            self.input_str("command")
                .map(|command| ToolCall::Command { command })
        } else if AGENT_TOOLS.contains(&tool_name.as_str()) {
            self.input_str("subagent_type")
                .map(|agent_type| ToolCall::AgentSpawn { agent_type })
        } else {
            None
        };
        call.unwrap_or(ToolCall::Other { tool_name })
    }

    fn exit_code(&self) -> Option<i64> {
        let response = self.tool_response.as_ref()?;
        response
            .get("exit_code")
            .or_else(|| response.get("exitCode"))
            .and_then(Value::as_i64)
    }
}
