// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Regex fallback parser for unstructured agent output.
//!
//! Matching is exclusive and priority-ordered: for each input line at most one
//! event is produced, and specific patterns run before broad ones so a line is
//! never double-counted. Priority: file modification, git operation, test
//! result, lint output, build output, progress indicator, generic error.
//!
//! Tool-use detection is deliberately absent here; the structured stream
//! carries the authoritative tool identity.

use regex::Regex;
use serde::{Deserialize, Serialize};
use vc_core::{to_data, AgentEvent, EventType, Severity};

/// File operation classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Created,
    Modified,
    Deleted,
}

/// Payload for `file_modified` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileModifiedData {
    pub path: String,
    pub operation: FileOperation,
}

/// Payload for `test_run` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRunData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_failed: Option<u64>,
}

/// Payload for `git_operation` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitOperationData {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Payload for `build_output` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOutputData {
    pub status: String,
}

/// Payload for `lint_output` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintOutputData {
    pub level: String,
}

/// Payload for `progress` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

struct Patterns {
    file_op: Regex,
    git_op: Regex,
    test_counts: Regex,
    test_verdict: Regex,
    lint: Regex,
    build_success: Regex,
    progress_step: Regex,
    progress_percent: Regex,
    progress_activity: Regex,
    generic_error: Regex,
}

impl Patterns {
    #[allow(clippy::expect_used)]
    fn compile() -> Self {
        // Pattern literals are fixed; compile failures are programmer errors
        // caught by the tests below.
        Self {
            file_op: Regex::new(
                r"^(Created|Create|Writing|Modified|Updated|Editing|Deleted|Removed|Removing):?\s+(\S.*?)\s*$",
            )
            .expect("file_op pattern"),
            git_op: Regex::new(r"^git\s+([a-z][a-z-]*)\s*(.*)$").expect("git_op pattern"),
            test_counts: Regex::new(r"(\d+)\s+tests?\s+(passed|failed)").expect("test_counts pattern"),
            test_verdict: Regex::new(r"\b(PASS|FAIL)\b").expect("test_verdict pattern"),
            lint: Regex::new(r"(?i)\blint(?:er)?\b.*\b(warning|error):").expect("lint pattern"),
            build_success: Regex::new(
                r"(?i)\b(?:build|compilation)\s+(?:succeeded|complete(?:d)?)\b",
            )
            .expect("build_success pattern"),
            progress_step: Regex::new(r"^Step\s+(\d+)\s+of\s+(\d+)").expect("progress_step pattern"),
            progress_percent: Regex::new(r"\[(\d{1,3})%\]").expect("progress_percent pattern"),
            progress_activity: Regex::new(r"^(Processing|Analyzing|Executing):?\s+(.+\S)\s*$")
                .expect("progress_activity pattern"),
            generic_error: Regex::new(r"^(?i)(error|fatal|panic):\s*(.*)$")
                .expect("generic_error pattern"),
        }
    }
}

/// Stateful line parser for one claim.
pub struct OutputParser {
    patterns: Patterns,
    line_no: u64,
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser {
    pub fn new() -> Self {
        Self {
            patterns: Patterns::compile(),
            line_no: 0,
        }
    }

    /// Lines seen so far (matched or not).
    pub fn lines_seen(&self) -> u64 {
        self.line_no
    }

    /// Match one line against the pattern set. At most one event per line;
    /// first match wins.
    pub fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        self.line_no += 1;
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            return None;
        }

        let event = self
            .match_file_op(trimmed)
            .or_else(|| self.match_git_op(trimmed))
            .or_else(|| self.match_test(trimmed))
            .or_else(|| self.match_lint(trimmed))
            .or_else(|| self.match_build(trimmed))
            .or_else(|| self.match_progress(trimmed))
            .or_else(|| self.match_generic_error(trimmed))?;

        Some(event.with_source_line(trimmed))
    }

    fn match_file_op(&self, line: &str) -> Option<AgentEvent> {
        let caps = self.patterns.file_op.captures(line)?;
        let verb = caps.get(1)?.as_str();
        let path = caps.get(2)?.as_str();
        let operation = match verb {
            "Created" | "Create" | "Writing" => FileOperation::Created,
            "Deleted" | "Removed" | "Removing" => FileOperation::Deleted,
            _ => FileOperation::Modified,
        };
        Some(
            AgentEvent::info(EventType::FileModified, format!("{verb}: {path}")).with_data(
                to_data(&FileModifiedData {
                    path: path.to_string(),
                    operation,
                }),
            ),
        )
    }

    fn match_git_op(&self, line: &str) -> Option<AgentEvent> {
        let caps = self.patterns.git_op.captures(line)?;
        let command = caps.get(1)?.as_str().to_string();
        let args: Vec<String> = caps
            .get(2)
            .map(|m| m.as_str().split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        // Remote-affecting and history-rewriting commands are worth a warning
        let severity = match command.as_str() {
            "push" | "rebase" | "merge" => Severity::Warning,
            _ => Severity::Info,
        };
        Some(
            AgentEvent::new(EventType::GitOperation, severity, line.to_string())
                .with_data(to_data(&GitOperationData { command, args })),
        )
    }

    fn match_test(&self, line: &str) -> Option<AgentEvent> {
        let mut data = TestRunData::default();
        for caps in self.patterns.test_counts.captures_iter(line) {
            let count: u64 = caps.get(1)?.as_str().parse().ok()?;
            match caps.get(2)?.as_str() {
                "passed" => data.tests_passed = Some(count),
                _ => data.tests_failed = Some(count),
            }
        }
        if let Some(caps) = self.patterns.test_verdict.captures(line) {
            data.outcome = Some(match caps.get(1)?.as_str() {
                "PASS" => "pass".to_string(),
                _ => "fail".to_string(),
            });
        }
        if data == TestRunData::default() {
            return None;
        }

        let failed = data.tests_failed.unwrap_or(0) > 0
            || data.outcome.as_deref() == Some("fail");
        let severity = if failed { Severity::Error } else { Severity::Info };
        Some(
            AgentEvent::new(EventType::TestRun, severity, line.to_string())
                .with_data(to_data(&data)),
        )
    }

    fn match_lint(&self, line: &str) -> Option<AgentEvent> {
        let caps = self.patterns.lint.captures(line)?;
        let level = caps.get(1)?.as_str().to_lowercase();
        let severity = if level == "error" {
            Severity::Error
        } else {
            Severity::Warning
        };
        Some(
            AgentEvent::new(EventType::LintOutput, severity, line.to_string())
                .with_data(to_data(&LintOutputData { level })),
        )
    }

    fn match_build(&self, line: &str) -> Option<AgentEvent> {
        if self.patterns.build_success.is_match(line) {
            return Some(
                AgentEvent::info(EventType::BuildOutput, line.to_string()).with_data(to_data(
                    &BuildOutputData {
                        status: "succeeded".to_string(),
                    },
                )),
            );
        }

        // Leading error:/fatal:/panic: lines belong to the generic-error
        // pattern, not build output.
        if self.patterns.generic_error.is_match(line) {
            return None;
        }

        let lower = line.to_lowercase();
        if lower.contains("compilation failed") || lower.contains("build failed") {
            return Some(
                AgentEvent::new(EventType::BuildOutput, Severity::Error, line.to_string())
                    .with_data(to_data(&BuildOutputData {
                        status: "failed".to_string(),
                    })),
            );
        }
        if line.contains("error:") {
            return Some(
                AgentEvent::new(EventType::BuildOutput, Severity::Error, line.to_string())
                    .with_data(to_data(&BuildOutputData {
                        status: "error".to_string(),
                    })),
            );
        }
        if line.contains("warning:") {
            return Some(
                AgentEvent::new(EventType::BuildOutput, Severity::Warning, line.to_string())
                    .with_data(to_data(&BuildOutputData {
                        status: "warning".to_string(),
                    })),
            );
        }
        None
    }

    fn match_progress(&self, line: &str) -> Option<AgentEvent> {
        let mut data = ProgressData::default();
        if let Some(caps) = self.patterns.progress_step.captures(line) {
            data.step = caps.get(1)?.as_str().parse().ok();
            data.total_steps = caps.get(2)?.as_str().parse().ok();
        } else if let Some(caps) = self.patterns.progress_percent.captures(line) {
            data.percent = caps.get(1)?.as_str().parse().ok();
        } else if let Some(caps) = self.patterns.progress_activity.captures(line) {
            data.activity = Some(format!(
                "{}: {}",
                caps.get(1)?.as_str(),
                caps.get(2)?.as_str()
            ));
        } else {
            return None;
        }
        Some(
            AgentEvent::info(EventType::Progress, line.to_string()).with_data(to_data(&data)),
        )
    }

    fn match_generic_error(&self, line: &str) -> Option<AgentEvent> {
        let caps = self.patterns.generic_error.captures(line)?;
        let kind = caps.get(1)?.as_str().to_lowercase();
        // Panics and fatals are process-ending
        let severity = if kind == "panic" || kind == "fatal" {
            Severity::Critical
        } else {
            Severity::Error
        };
        Some(AgentEvent::new(EventType::Error, severity, line.to_string()))
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
