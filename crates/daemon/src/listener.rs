// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket listener.
//!
//! Accepts connections on the store-adjacent Unix socket and serves one
//! request per connection without blocking the claim loop. Handlers go
//! through [`ExecutorControl`]; they signal via tokens and labels, never by
//! reentering the claim loop.

use crate::protocol::{self, Request, Response};
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};
use vc_core::{Clock, IssueId};
use vc_engine::ExecutorControl;

/// The bound control socket.
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlSocket {
    /// Bind, removing any stale socket file first.
    pub fn bind(path: &Path) -> std::io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept loop; runs until the task is dropped at shutdown.
    pub async fn run<C: Clock>(self, control: ExecutorControl<C>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let control = control.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &control).await {
                            match e {
                                protocol::ProtocolError::ConnectionClosed => {
                                    debug!("control client disconnected")
                                }
                                protocol::ProtocolError::Timeout => {
                                    warn!("control connection timed out")
                                }
                                _ => error!("control connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("control socket accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection<C: Clock>(
    mut stream: UnixStream,
    control: &ExecutorControl<C>,
) -> Result<(), protocol::ProtocolError> {
    let request = protocol::read_request(&mut stream).await?;
    tracing::info!(request = ?request, "control request");

    let response = handle_request(request, control);

    protocol::write_response(&mut stream, &response).await
}

fn handle_request<C: Clock>(request: Request, control: &ExecutorControl<C>) -> Response {
    match request {
        Request::Pause { issue_id, reason } => {
            match control.pause(&IssueId::new(issue_id), reason.as_deref()) {
                Ok(message) => Response::ok(message),
                Err(error) => Response::err(error),
            }
        }

        Request::Resume { issue_id } => match control.resume(&IssueId::new(issue_id)) {
            Ok(message) => Response::ok(message),
            Err(error) => Response::err(error),
        },

        Request::Status => {
            let status = control.status();
            match serde_json::to_value(&status) {
                Ok(data) => Response::ok_with_data("executor status", data),
                Err(e) => Response::err(format!("status serialization failed: {e}")),
            }
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
