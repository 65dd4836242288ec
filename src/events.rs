//! Typed event records extracted from one agent session log.
//!
//! Every line of a raw log becomes zero or more [`Event`]s. Events carry a
//! per-run `seq` that is the only ordering authority downstream.

use serde::Serialize;
use serde_json::Value;

/// Position of an event within its run. Unique per run, starts at 0.
pub type Seq = u64;

/// Tool names as they appear in session logs.
pub mod tools {
    pub const READ: &str = "Read";
    pub const EDIT: &str = "Edit";
    pub const WRITE: &str = "Write";
    pub const GLOB: &str = "Glob";
    pub const GREP: &str = "Grep";
    pub const BASH: &str = "Bash";
    pub const SKILL: &str = "Skill";
    pub const TASK: &str = "Task";
    pub const TASK_OUTPUT: &str = "TaskOutput";
    pub const WEB_FETCH: &str = "WebFetch";
    pub const TODO_WRITE: &str = "TodoWrite";
    pub const KILL_SHELL: &str = "KillShell";
    /// Symbol lookup served from fmm sidecar files.
    pub const READ_SYMBOL: &str = "mcp__mcp-files__read_symbol";

    /// Tools that create or modify files.
    pub const EDIT_TOOLS: &[&str] = &[EDIT, WRITE];
}

/// One occurrence within a single session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub seq: Seq,
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The closed set of event kinds the extractor can produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Init(InitInfo),
    ToolCall(ToolCall),
    TokenUsage(TokenUsage),
    UserMessage,
    AssistantText { text_length: usize },
}

impl EventKind {
    /// Short name used in diagnostics and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Init(_) => "init",
            EventKind::ToolCall(_) => "tool_call",
            EventKind::TokenUsage(_) => "token_usage",
            EventKind::UserMessage => "user_message",
            EventKind::AssistantText { .. } => "assistant_text",
        }
    }
}

/// Session start-up record. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitInfo {
    pub cwd: Option<String>,
    pub model: Option<String>,
    pub tools: Vec<String>,
    pub mcp_servers: Vec<String>,
}

/// A single tool invocation from an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub tool_id: Option<String>,
    pub file_path: Option<String>,
    pub command: Option<String>,
    pub arguments: Value,
}

impl ToolCall {
    /// Build a tool call with no raw arguments attached.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_id: None,
            file_path: None,
            command: None,
            arguments: Value::Null,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// File path, or the empty string when the tool has none.
    pub fn path_str(&self) -> &str {
        self.file_path.as_deref().unwrap_or("")
    }

    /// Command text, or the empty string when the tool has none.
    pub fn command_str(&self) -> &str {
        self.command.as_deref().unwrap_or("")
    }
}

/// Where a usage figure was reported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    /// The final assistant message.
    Assistant,
    /// The message-start preview of a streamed response.
    StreamMessageStart,
}

/// Token counters for one model message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenUsage {
    pub source: UsageSource,
    pub message_id: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

/// A named, ordered event sequence parsed from one log source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub name: String,
    pub events: Vec<Event>,
}

impl Run {
    pub fn new(name: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.events.iter().filter_map(|e| match &e.kind {
            EventKind::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn token_usages(&self) -> impl Iterator<Item = &TokenUsage> {
        self.events.iter().filter_map(|e| match &e.kind {
            EventKind::TokenUsage(usage) => Some(usage),
            _ => None,
        })
    }
}
