#![allow(dead_code)]

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

/// Session init record.
pub fn init() -> Value {
    json!({
        "type": "system",
        "subtype": "init",
        "session_id": "sess-1",
        "cwd": "/test",
        "model": "claude-opus-4-5-20251101",
        "tools": ["Read", "Edit", "Bash"],
        "mcp_servers": [],
    })
}

/// Assistant turn with usage and the given content blocks.
pub fn assistant(msg_id: &str, input_tokens: u64, output_tokens: u64, blocks: Vec<Value>) -> Value {
    json!({
        "type": "assistant",
        "session_id": "sess-1",
        "message": {
            "id": msg_id,
            "content": blocks,
            "usage": {
                "input_tokens": input_tokens,
                "output_tokens": output_tokens,
                "cache_creation_input_tokens": 10,
                "cache_read_input_tokens": 20,
            },
        },
    })
}

pub fn tool_use(name: &str, input: Value) -> Value {
    json!({"type": "tool_use", "name": name, "id": format!("tool-{name}"), "input": input})
}

pub fn read(path: &str) -> Value {
    tool_use("Read", json!({ "file_path": path }))
}

pub fn edit(path: &str) -> Value {
    tool_use("Edit", json!({ "file_path": path, "old_string": "a", "new_string": "b" }))
}

pub fn bash(command: &str) -> Value {
    tool_use("Bash", json!({ "command": command }))
}

pub fn text(body: &str) -> Value {
    json!({"type": "text", "text": body})
}

pub fn user() -> Value {
    json!({"type": "user", "session_id": "sess-1"})
}

pub fn stream_start(msg_id: &str, input_tokens: u64) -> Value {
    json!({
        "type": "stream_event",
        "session_id": "sess-1",
        "event": {
            "type": "message_start",
            "message": {
                "id": msg_id,
                "usage": {
                    "input_tokens": input_tokens,
                    "output_tokens": 0,
                    "cache_creation_input_tokens": 0,
                    "cache_read_input_tokens": 0,
                },
            },
        },
    })
}

pub fn stream_delta(output_tokens: u64) -> Value {
    json!({
        "type": "stream_event",
        "session_id": "sess-1",
        "event": {"type": "message_delta", "usage": {"output_tokens": output_tokens}},
    })
}

/// Write records as one JSON object per line.
pub fn write_ndjson(path: &Path, records: &[Value]) {
    let body: String = records.iter().map(|r| format!("{r}\n")).collect();
    fs::write(path, body).unwrap();
}
