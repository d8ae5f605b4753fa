// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use vc_core::{EventType, Severity};

fn parse(line: &str) -> Option<vc_core::AgentEvent> {
    OutputParser::new().parse_line(line)
}

#[yare::parameterized(
    created  = { "Created: src/lib.rs", "src/lib.rs", "created" },
    writing  = { "Writing src/main.rs", "src/main.rs", "created" },
    modified = { "Modified: src/parser.rs", "src/parser.rs", "modified" },
    updated  = { "Updated config.toml", "config.toml", "modified" },
    editing  = { "Editing: deep/path/file.txt", "deep/path/file.txt", "modified" },
    deleted  = { "Deleted: old.rs", "old.rs", "deleted" },
    removing = { "Removing tmp/scratch", "tmp/scratch", "deleted" },
)]
fn file_ops(line: &str, path: &str, operation: &str) {
    let event = parse(line).unwrap();
    assert_eq!(event.event_type, EventType::FileModified);
    assert_eq!(event.data["path"], path);
    assert_eq!(event.data["operation"], operation);
    assert_eq!(event.source_line.as_deref(), Some(line));
}

#[test]
fn git_operation_with_args() {
    let event = parse("git commit -m \"fix\"").unwrap();
    assert_eq!(event.event_type, EventType::GitOperation);
    assert_eq!(event.severity, Severity::Info);
    assert_eq!(event.data["command"], "commit");
}

#[yare::parameterized(
    push   = { "git push origin main" },
    rebase = { "git rebase main" },
    merge  = { "git merge feature" },
)]
fn risky_git_commands_are_warnings(line: &str) {
    let event = parse(line).unwrap();
    assert_eq!(event.event_type, EventType::GitOperation);
    assert_eq!(event.severity, Severity::Warning);
}

#[test]
fn test_counts_and_verdicts() {
    let event = parse("12 tests passed").unwrap();
    assert_eq!(event.event_type, EventType::TestRun);
    assert_eq!(event.severity, Severity::Info);
    assert_eq!(event.data["tests_passed"], 12);

    let event = parse("3 tests failed").unwrap();
    assert_eq!(event.severity, Severity::Error);
    assert_eq!(event.data["tests_failed"], 3);

    let event = parse("PASS src/lib.rs").unwrap();
    assert_eq!(event.data["outcome"], "pass");

    let event = parse("FAIL src/parser.rs").unwrap();
    assert_eq!(event.data["outcome"], "fail");
    assert_eq!(event.severity, Severity::Error);
}

#[test]
fn lint_takes_priority_over_build_for_lint_lines() {
    let event = parse("linter found 2 issues, warning: unused import").unwrap();
    assert_eq!(event.event_type, EventType::LintOutput);
    assert_eq!(event.severity, Severity::Warning);
    assert_eq!(event.data["level"], "warning");

    let event = parse("lint: error: shadowed variable").unwrap();
    assert_eq!(event.event_type, EventType::LintOutput);
    assert_eq!(event.severity, Severity::Error);
}

#[yare::parameterized(
    success_build       = { "Build succeeded", "succeeded", Severity::Info },
    success_compilation = { "compilation complete", "succeeded", Severity::Info },
    failed              = { "compilation failed with 2 errors", "failed", Severity::Error },
    embedded_error      = { "src/lib.rs:10: error: mismatched types", "error", Severity::Error },
    embedded_warning    = { "src/lib.rs:12: warning: unused", "warning", Severity::Warning },
)]
fn build_output(line: &str, status: &str, severity: Severity) {
    let event = parse(line).unwrap();
    assert_eq!(event.event_type, EventType::BuildOutput);
    assert_eq!(event.data["status"], status);
    assert_eq!(event.severity, severity);
}

#[test]
fn progress_forms() {
    let event = parse("Step 2 of 5").unwrap();
    assert_eq!(event.event_type, EventType::Progress);
    assert_eq!(event.data["step"], 2);
    assert_eq!(event.data["total_steps"], 5);

    let event = parse("downloading [45%]").unwrap();
    assert_eq!(event.data["percent"], 45);

    let event = parse("Analyzing: dependency graph").unwrap();
    assert_eq!(event.data["activity"], "Analyzing: dependency graph");
}

#[yare::parameterized(
    error = { "error: no such file", Severity::Error },
    fatal = { "fatal: repository not found", Severity::Critical },
    panic = { "panic: index out of range", Severity::Critical },
)]
fn generic_errors(line: &str, severity: Severity) {
    let event = parse(line).unwrap();
    assert_eq!(event.event_type, EventType::Error);
    assert_eq!(event.severity, severity);
}

#[test]
fn leading_error_is_generic_error_not_build_output() {
    let event = parse("error: cannot borrow `x`").unwrap();
    assert_eq!(event.event_type, EventType::Error);
}

#[test]
fn matching_is_exclusive_one_event_per_line() {
    // Contains both a file-op verb and a test verdict; file op wins by priority
    let event = parse("Modified: tests/parser.rs PASS").unwrap();
    assert_eq!(event.event_type, EventType::FileModified);
}

#[test]
fn unmatched_lines_produce_nothing_but_count() {
    let mut parser = OutputParser::new();
    assert!(parser.parse_line("thinking about the problem...").is_none());
    assert!(parser.parse_line("").is_none());
    assert!(parser.parse_line("Step 1 of 2").is_some());
    assert_eq!(parser.lines_seen(), 3);
}

#[test]
fn no_tool_use_detection_in_regex_path() {
    // Tool identity only comes from the structured stream
    assert!(parse("Using tool: Bash").is_none());
}
