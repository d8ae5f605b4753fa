// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc activity` — recent agent events, newest first.

use super::{format_timestamp, open_store_read_only};
use crate::exit_error::ExitError;
use clap::Args;
use std::path::Path;
use vc_core::AgentEvent;
use vc_store::IssueStore;

#[derive(Debug, Args)]
pub struct ActivityArgs {
    /// Number of events to show
    #[arg(long, short = 'n', default_value_t = 20)]
    pub limit: usize,

    /// Only events for this issue
    #[arg(long, value_name = "ID")]
    pub issue: Option<String>,
}

pub fn run(project_root: &Path, args: ActivityArgs) -> Result<(), ExitError> {
    let store = open_store_read_only(project_root)?;

    let events = match &args.issue {
        Some(issue_id) => {
            let mut events = store.get_agent_events_by_issue(&issue_id.as_str().into())?;
            events.reverse();
            events.truncate(args.limit);
            events
        }
        None => store.get_recent_agent_events(args.limit)?,
    };

    if events.is_empty() {
        println!("no events");
        return Ok(());
    }
    for event in &events {
        println!("{}", format_event(event));
    }
    Ok(())
}

pub(crate) fn format_event(event: &AgentEvent) -> String {
    let issue = event
        .issue_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {:8}  {:28}  {}  {}",
        format_timestamp(event.timestamp),
        event.severity,
        event.event_type,
        issue,
        event.message
    )
}
