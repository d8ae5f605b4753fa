// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc pause` / `vc resume` — control-socket clients.

use crate::exit_error::ExitError;
use clap::Args;
use std::path::Path;
use vc_daemon::{send_request, Request, Response};
use vc_store::StorePaths;

#[derive(Debug, Args)]
pub struct PauseArgs {
    /// Issue to pause
    pub issue_id: String,

    /// Reason recorded with the pause
    pub reason: Option<String>,
}

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Issue to resume
    pub issue_id: String,
}

pub async fn run_pause(project_root: &Path, args: PauseArgs) -> Result<(), ExitError> {
    let response = send(
        project_root,
        &Request::Pause {
            issue_id: args.issue_id,
            reason: args.reason,
        },
    )
    .await?;
    print_response(response)
}

pub async fn run_resume(project_root: &Path, args: ResumeArgs) -> Result<(), ExitError> {
    let response = send(
        project_root,
        &Request::Resume {
            issue_id: args.issue_id,
        },
    )
    .await?;
    print_response(response)
}

async fn send(project_root: &Path, request: &Request) -> Result<Response, ExitError> {
    let paths = StorePaths::for_project(project_root);
    if !paths.socket_path.exists() {
        return Err(ExitError::precondition(
            "no executor is running (control socket missing) — start one with `vc execute`"
                .to_string(),
        ));
    }
    send_request(&paths.socket_path, request)
        .await
        .map_err(|e| ExitError::failure(format!("control request failed: {e}")))
}

fn print_response(response: Response) -> Result<(), ExitError> {
    if response.success {
        println!("{}", response.message);
        Ok(())
    } else {
        Err(ExitError::failure(
            response.error.unwrap_or_else(|| "command failed".to_string()),
        ))
    }
}
