// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket protocol.
//!
//! One JSON object per line. The server reads the request one byte at a time
//! under a 5 s read deadline; clients apply a 10 s end-to-end command
//! deadline. Responses are `{success, message, data, error}`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Server-side read deadline for one request line.
pub const READ_DEADLINE: Duration = Duration::from_secs(5);

/// Client-side deadline for a whole command round trip.
pub const COMMAND_DEADLINE: Duration = Duration::from_secs(10);

/// Cap on a single request line.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request too large (over {MAX_REQUEST_BYTES} bytes)")]
    RequestTooLarge,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,
}

/// Commands a client can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    /// Cancel the active claim for an issue; checkpoint and release it.
    Pause {
        issue_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Clear an issue's `interrupted` label so it becomes ready again.
    Resume { issue_id: String },
    /// Executor status snapshot.
    Status,
}

/// The uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn ok_with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: String::new(),
            data: None,
            error: Some(error),
        }
    }
}

/// Read one request line, one byte at a time, under the read deadline.
pub async fn read_request<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Request, ProtocolError> {
    let line = tokio::time::timeout(READ_DEADLINE, read_line(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    Ok(serde_json::from_slice(&line)?)
}

async fn read_line<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read_exact(&mut byte).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                if line.is_empty() {
                    return Err(ProtocolError::ConnectionClosed);
                }
                return Ok(line);
            }
            Err(e) => return Err(ProtocolError::Io(e)),
        }
        if byte[0] == b'\n' {
            return Ok(line);
        }
        line.push(byte[0]);
        if line.len() > MAX_REQUEST_BYTES {
            return Err(ProtocolError::RequestTooLarge);
        }
    }
}

/// Write one response line.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), ProtocolError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Client side: connect, send one request, read one response, all within the
/// command deadline.
pub async fn send_request(
    socket_path: &Path,
    request: &Request,
) -> Result<Response, ProtocolError> {
    tokio::time::timeout(COMMAND_DEADLINE, async {
        let mut stream = UnixStream::connect(socket_path).await?;
        let mut payload = serde_json::to_vec(request)?;
        payload.push(b'\n');
        stream.write_all(&payload).await?;
        stream.flush().await?;

        let line = read_line(&mut stream).await?;
        Ok(serde_json::from_slice(&line)?)
    })
    .await
    .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
