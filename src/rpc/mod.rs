//! JSON-RPC 2.0 server
//!
//! Exposes collection listing, search and stats over stdio, one JSON
//! message per line.

mod handlers;
mod server;
mod types;

pub use server::RpcServer;
pub use types::{ErrorCode, RepoParam, RpcError, RpcRequest, RpcResponse};
