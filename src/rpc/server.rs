//! JSON-RPC stdio server

use super::handlers::dispatch;
use super::types::{RpcError, RpcRequest, RpcResponse};
use crate::error::{Error, Result};
use crate::fetch::FetchCoordinator;
use crate::search::SearchEngine;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// RPC server answering one newline-delimited message at a time
pub struct RpcServer {
    coordinator: Arc<FetchCoordinator>,
    search: Arc<SearchEngine>,
    request_timeout: Duration,
}

impl RpcServer {
    pub fn new(
        coordinator: Arc<FetchCoordinator>,
        search: Arc<SearchEngine>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            search,
            request_timeout,
        }
    }

    /// Run the server loop over stdio
    pub async fn run_stdio(&self) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve requests from `reader` until it is exhausted
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("RPC server starting");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("Received: {}", line);

            if let Some(response) = self.handle_line(line).await {
                let response_str = serde_json::to_string(&response)?;
                debug!("Sending: {}", response_str);
                writer.write_all(response_str.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("RPC server shutting down");
        Ok(())
    }

    /// Handle one raw message; notifications produce no response
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to parse message: {}", e);
                return Some(RpcResponse::error(
                    None,
                    RpcError::parse_error(format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned().filter(|id| !id.is_null());
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(RpcResponse::error(
                    id,
                    RpcError::invalid_request(format!("Invalid request: {}", e)),
                ));
            }
        };
        if request.jsonrpc != "2.0" {
            return Some(RpcResponse::error(
                id,
                RpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        let notification = request.is_notification();
        let response = self.handle_request(request).await;
        if notification {
            if let Some(error) = response.error {
                warn!(code = error.code, "Notification failed: {}", error.message);
            }
            return None;
        }
        Some(response)
    }

    async fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        let method = request.method.clone();

        let call = dispatch(&self.coordinator, &self.search, &method, request.params);
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(result)) => RpcResponse::success(id, result),
            Ok(Err(e)) => {
                debug!(method = %method, code = e.code, "Request failed: {}", e.message);
                RpcResponse::error(id, e)
            }
            Err(_) => {
                warn!(method = %method, timeout = ?self.request_timeout, "Request timed out");
                RpcResponse::error(id, Error::Timeout(method.clone()).into())
            }
        }
    }
}
