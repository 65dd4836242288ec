use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events::{tools, Event, EventKind, InitInfo, Run, Seq, TokenUsage, ToolCall, UsageSource};

use super::DiscoveryConfig;

/// Task prompts are kept only up to this many characters.
const TASK_PROMPT_LIMIT: usize = 200;

/// List the run logs in `log_dir` as `(run name, path)`, sorted by name.
pub fn discover_log_files(
    log_dir: &Path,
    config: &DiscoveryConfig,
) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(log_dir).map_err(|e| Error::io(log_dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(log_dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        match config.run_name(&path) {
            Some(name) => files.push((name, path)),
            None => debug!(path = %path.display(), "skipping non-run log source"),
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Parse every run log in a condition directory, ordered by run name.
pub fn parse_experiment_logs(log_dir: &Path, config: &DiscoveryConfig) -> Result<Vec<Run>> {
    discover_log_files(log_dir, config)?
        .into_iter()
        .map(|(name, path)| {
            let events = parse_log_file(&path)?;
            info!(run = %name, events = events.len(), "parsed run log");
            Ok(Run::new(name, events))
        })
        .collect()
}

/// Parse all events from a raw session log.
///
/// Lines that are blank, not UTF-8, or not JSON objects are dropped; the
/// producer may have been killed mid-write. Only I/O failures are errors.
pub fn parse_log_file(path: &Path) -> Result<Vec<Event>> {
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let bytes = bytes.map_err(|e| Error::io(path, e))?;
        let Ok(line) = std::str::from_utf8(&bytes) else {
            debug!(path = %path.display(), line = idx + 1, "skipping non-UTF-8 log line");
            continue;
        };
        let next_seq = events.len() as Seq;
        events.extend(parse_jsonl_line(line, next_seq));
    }
    Ok(events)
}

/// Parse already-loaded log lines into one run's events.
pub fn parse_lines<I, S>(lines: I) -> Vec<Event>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut events = Vec::new();
    for line in lines {
        let next_seq = events.len() as Seq;
        events.extend(parse_jsonl_line(line.as_ref(), next_seq));
    }
    events
}

/// Parse a single JSONL line from a session log.
///
/// Emitted events are numbered consecutively from `first_seq`, in the order
/// they appear in the record.
pub fn parse_jsonl_line(line: &str, first_seq: Seq) -> Vec<Event> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let obj: Value = match serde_json::from_str(line) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => {
            debug!("skipping non-object log line");
            return Vec::new();
        }
        Err(err) => {
            debug!(%err, "skipping malformed log line");
            return Vec::new();
        }
    };

    let kinds = match obj.get("type").and_then(Value::as_str) {
        Some("system") if obj.get("subtype").and_then(Value::as_str) == Some("init") => {
            vec![EventKind::Init(parse_init(&obj))]
        }
        Some("assistant") => parse_assistant(&obj),
        Some("stream_event") => parse_stream_event(&obj).into_iter().collect(),
        Some("user") => vec![EventKind::UserMessage],
        _ => Vec::new(),
    };

    let session_id = str_field(&obj, "session_id");
    kinds
        .into_iter()
        .zip(first_seq..)
        .map(|(kind, seq)| Event {
            seq,
            session_id: session_id.clone(),
            kind,
        })
        .collect()
}

fn parse_init(obj: &Value) -> InitInfo {
    let tools = obj
        .get("tools")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    // Servers appear either as bare names or as {"name": .., "status": ..}.
    let mcp_servers = obj
        .get("mcp_servers")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str().or_else(|| s.get("name")?.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    InitInfo {
        cwd: str_field(obj, "cwd"),
        model: str_field(obj, "model"),
        tools,
        mcp_servers,
    }
}

/// Usage first, then one event per tool_use/text block in emission order.
fn parse_assistant(obj: &Value) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    let Some(message) = obj.get("message") else {
        return kinds;
    };

    if let Some(usage) = parse_usage(
        message.get("usage"),
        UsageSource::Assistant,
        str_field(message, "id"),
    ) {
        kinds.push(EventKind::TokenUsage(usage));
    }

    let content = match message.get("content") {
        Some(Value::Array(arr)) => arr,
        _ => return kinds,
    };

    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => kinds.push(EventKind::ToolCall(parse_tool_use(block))),
            Some("text") => {
                let text_length = block
                    .get("text")
                    .and_then(Value::as_str)
                    .map(|t| t.chars().count())
                    .unwrap_or(0);
                kinds.push(EventKind::AssistantText { text_length });
            }
            _ => {}
        }
    }

    kinds
}

/// Only message_start carries usage we keep. message_delta has no message id
/// and repeats output tokens the assistant record already reports.
fn parse_stream_event(obj: &Value) -> Option<EventKind> {
    let event = obj.get("event")?;
    if event.get("type").and_then(Value::as_str) != Some("message_start") {
        return None;
    }
    let message = event.get("message")?;
    parse_usage(
        message.get("usage"),
        UsageSource::StreamMessageStart,
        str_field(message, "id"),
    )
    .map(EventKind::TokenUsage)
}

fn parse_usage(
    usage: Option<&Value>,
    source: UsageSource,
    message_id: Option<String>,
) -> Option<TokenUsage> {
    let usage = usage?.as_object()?;
    if usage.is_empty() {
        return None;
    }
    Some(TokenUsage {
        source,
        message_id,
        input_tokens: counter(usage, "input_tokens"),
        output_tokens: counter(usage, "output_tokens"),
        cache_creation_tokens: counter(usage, "cache_creation_input_tokens"),
        cache_read_tokens: counter(usage, "cache_read_input_tokens"),
    })
}

fn counter(usage: &Map<String, Value>, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn parse_tool_use(block: &Value) -> ToolCall {
    let tool_name = block
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let arguments = block
        .get("input")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    ToolCall {
        file_path: extract_file_path(&tool_name, &arguments),
        command: extract_command(&tool_name, &arguments),
        tool_id: str_field(block, "id"),
        tool_name,
        arguments,
    }
}

/// Pull the file path a tool call touches from its arguments.
pub fn extract_file_path(tool_name: &str, args: &Value) -> Option<String> {
    let key = match tool_name {
        tools::READ | tools::EDIT | tools::WRITE => "file_path",
        // The glob pattern stands in for a path.
        tools::GLOB => "pattern",
        tools::GREP => "path",
        tools::READ_SYMBOL => {
            return args
                .get("file_paths")?
                .as_array()?
                .first()?
                .as_str()
                .map(String::from);
        }
        _ => return None,
    };
    str_field(args, key)
}

/// Pull the command-like text from shell, skill and task calls.
pub fn extract_command(tool_name: &str, args: &Value) -> Option<String> {
    match tool_name {
        tools::BASH => str_field(args, "command"),
        tools::SKILL => str_field(args, "skill"),
        tools::TASK => {
            let prompt = args.get("prompt").and_then(Value::as_str).unwrap_or("");
            Some(prompt.chars().take(TASK_PROMPT_LIMIT).collect())
        }
        _ => None,
    }
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(String::from)
}
