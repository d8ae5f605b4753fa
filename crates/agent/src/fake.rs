// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted shell agents for tests.
//!
//! Instead of a mock trait, tests exercise the real runner against tiny
//! `sh -c` scripts that emit canned output. This keeps subprocess plumbing
//! (pipes, signals, reaping) under test for free.

use crate::runner::AgentInvocation;
use std::path::Path;
use std::time::Duration;
use vc_core::AgentId;

/// A shell one-liner standing in for the coding agent.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    pub program: String,
    pub args: Vec<String>,
}

impl ScriptedAgent {
    fn new(script: impl Into<String>) -> Self {
        Self {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.into()],
        }
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Emit the given stdout lines, then exit with `exit_code`.
pub fn emit_lines(lines: &[&str], exit_code: i32) -> ScriptedAgent {
    let mut script = String::new();
    for line in lines {
        script.push_str("printf '%s\\n' ");
        script.push_str(&shell_quote(line));
        script.push_str("; ");
    }
    script.push_str(&format!("exit {exit_code}"));
    ScriptedAgent::new(script)
}

/// Emit lines on stderr, then exit 0.
pub fn emit_stderr_lines(lines: &[&str]) -> ScriptedAgent {
    let mut script = String::new();
    for line in lines {
        script.push_str("printf '%s\\n' ");
        script.push_str(&shell_quote(line));
        script.push_str(" >&2; ");
    }
    script.push_str("exit 0");
    ScriptedAgent::new(script)
}

/// Echo stdin back to stdout (the brief becomes the output), then exit 0.
pub fn echo_stdin() -> ScriptedAgent {
    ScriptedAgent::new("cat")
}

/// Sleep until interrupted; exits promptly (130) on SIGINT.
pub fn graceful_on_interrupt() -> ScriptedAgent {
    ScriptedAgent::new(
        "trap 'exit 130' INT; printf 'working\\n'; sleep 30 >/dev/null 2>&1 & wait $!",
    )
}

/// Sleep ignoring SIGINT; only SIGKILL ends it.
pub fn ignores_interrupt() -> ScriptedAgent {
    ScriptedAgent::new("trap '' INT; printf 'working\\n'; sleep 30 >/dev/null 2>&1")
}

/// A structured-stream result line with the given success flag.
pub fn result_line(success: bool) -> String {
    format!(
        "{{\"type\":\"result\",\"success\":{success},\"summary\":\"done\"}}"
    )
}

/// Invocation with short test timeouts.
pub fn invocation(agent: &ScriptedAgent, cwd: &Path) -> AgentInvocation {
    AgentInvocation {
        agent_id: AgentId::new("agent-test"),
        program: agent.program.clone(),
        args: agent.args.clone(),
        env: Vec::new(),
        cwd: cwd.to_path_buf(),
        brief: "do the task".to_string(),
        checkpoint: None,
        timeout: Duration::from_secs(10),
        kill_grace: Duration::from_millis(500),
    }
}
