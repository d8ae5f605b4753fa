// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured NDJSON stream decoding.
//!
//! Agents that support the structured protocol emit one JSON object per
//! stdout line. Each object becomes at most one typed event. This path is
//! preferred over regex matching — tool identity in particular is only
//! trusted from here.

use crate::parser::{FileModifiedData, FileOperation};
use crate::report::AgentReport;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vc_core::{to_data, AgentEvent, EventType, Severity};

/// One record of the agent's structured stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The agent invoked a tool.
    ToolUse {
        tool: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        input: Map<String, Value>,
    },
    /// Periodic liveness signal.
    Heartbeat,
    /// Agent lifecycle state change (e.g. "planning", "editing").
    StateChange { state: String },
    /// A file was created/modified/deleted.
    FileModified {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },
    /// Context-window usage report.
    ContextUsage {
        tokens_used: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u64>,
    },
    /// Free-form progress message.
    Progress { message: String },
    /// Agent-reported error.
    Error { message: String },
    /// Terminal report; the stream ends after this.
    Result(AgentReport),
}

/// Try to decode a stdout line as a structured record.
///
/// Non-JSON lines and JSON without a recognized `type` return `None` and fall
/// through to the regex parser.
pub fn parse_stream_line(line: &str) -> Option<StreamEvent> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Convert a structured record into an event row.
///
/// `Result` returns `None`: the runner consumes the report directly rather
/// than storing it as an event.
pub fn to_agent_event(stream_event: &StreamEvent, source_line: &str) -> Option<AgentEvent> {
    let event = match stream_event {
        StreamEvent::ToolUse { tool, input } => {
            let mut data = Map::new();
            data.insert("tool".to_string(), Value::String(tool.clone()));
            if !input.is_empty() {
                data.insert("input".to_string(), Value::Object(input.clone()));
            }
            AgentEvent::info(EventType::AgentToolUse, format!("tool: {tool}")).with_data(data)
        }

        StreamEvent::Heartbeat => AgentEvent::info(EventType::AgentHeartbeat, "heartbeat"),

        StreamEvent::StateChange { state } => {
            AgentEvent::info(EventType::AgentStateChange, format!("state: {state}"))
                .with_field("state", state.clone())
        }

        StreamEvent::FileModified { path, operation } => {
            let op = match operation.as_deref() {
                Some("created") => FileOperation::Created,
                Some("deleted") => FileOperation::Deleted,
                _ => FileOperation::Modified,
            };
            AgentEvent::info(EventType::FileModified, format!("modified: {path}")).with_data(
                to_data(&FileModifiedData {
                    path: path.clone(),
                    operation: op,
                }),
            )
        }

        StreamEvent::ContextUsage {
            tokens_used,
            max_tokens,
        } => {
            let mut event = AgentEvent::info(
                EventType::ContextUsage,
                format!("context: {tokens_used} tokens"),
            )
            .with_field("tokens_used", *tokens_used);
            if let Some(max) = max_tokens {
                event = event.with_field("max_tokens", *max);
            }
            event
        }

        StreamEvent::Progress { message } => {
            AgentEvent::info(EventType::Progress, message.clone())
        }

        StreamEvent::Error { message } => {
            AgentEvent::new(EventType::Error, Severity::Error, message.clone())
        }

        StreamEvent::Result(_) => return None,
    };

    Some(event.with_source_line(source_line))
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
