//! JSON-RPC 2.0 types and method parameters

use crate::error::Error;
use crate::models::{RepoIdentity, DEFAULT_HOSTNAME};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC 2.0 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, msg)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Method not found: {}", method))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, msg)
    }
}

impl From<Error> for RpcError {
    fn from(e: Error) -> Self {
        if e.is_caller_error() {
            Self::invalid_params(e.to_string())
        } else if matches!(e, Error::Timeout(_)) {
            Self::internal_error("request timed out")
        } else {
            Self::internal_error(e.to_string())
        }
    }
}

/// JSON-RPC 2.0 request; a missing `id` makes it a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_string()
}

/// Repository reference as sent by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoParam {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    pub owner: String,
    pub repo: String,
}

impl RepoParam {
    pub fn identity(&self) -> Result<RepoIdentity, RpcError> {
        RepoIdentity::new(&self.hostname, &self.owner, &self.repo).map_err(RpcError::from)
    }
}

pub fn identities(params: &[RepoParam]) -> Result<Vec<RepoIdentity>, RpcError> {
    params.iter().map(RepoParam::identity).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListCollectionsParams {
    pub repositories: Vec<RepoParam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryParams {
    pub repository: RepoParam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListProjectsParams {
    pub repository: RepoParam,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchProjectsParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub repositories: Vec<RepoParam>,
    #[serde(default)]
    pub limit: Option<i64>,
}
