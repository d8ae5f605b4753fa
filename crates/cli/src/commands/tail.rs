// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc tail` — print events in order; `-f` keeps following the store.

use super::{activity::format_event, open_store_read_only};
use crate::exit_error::ExitError;
use clap::Args;
use std::path::Path;
use std::time::Duration;
use vc_store::{EventFilter, IssueStore};

/// Re-read interval while following.
const FOLLOW_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Keep following new events
    #[arg(short = 'f', long)]
    pub follow: bool,

    /// Number of trailing events to start from
    #[arg(long, short = 'n', default_value_t = 10)]
    pub lines: usize,
}

pub async fn run(project_root: &Path, args: TailArgs) -> Result<(), ExitError> {
    let store = open_store_read_only(project_root)?;
    let mut events = store.get_agent_events(&EventFilter {
        limit: Some(args.lines),
        ..Default::default()
    })?;
    for event in &events {
        println!("{}", format_event(event));
    }

    if !args.follow {
        return Ok(());
    }

    // Follow by re-reading snapshot+WAL; the id of the last printed event
    // marks our position.
    let mut last_seen = events.pop().map(|e| e.id);
    loop {
        tokio::time::sleep(FOLLOW_INTERVAL).await;
        let store = open_store_read_only(project_root)?;
        let all = store.get_agent_events(&EventFilter::default())?;

        let start = match &last_seen {
            Some(id) => all
                .iter()
                .position(|e| &e.id == id)
                .map(|pos| pos + 1)
                .unwrap_or(0),
            None => 0,
        };
        for event in &all[start..] {
            println!("{}", format_event(event));
        }
        if let Some(event) = all.last() {
            last_seen = Some(event.id.clone());
        }
    }
}
