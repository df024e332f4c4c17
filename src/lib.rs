//! awesome-index: a cache-aside aggregator for curated awesome lists
//!
//! Awesome-list READMEs are fetched from GitHub, parsed into categories and
//! projects, stored in Postgres with pgvector embeddings and served over a
//! JSON-RPC stdio server or the CLI.

pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod github;
pub mod ingest;
pub mod models;
pub mod parse;
pub mod progress;
pub mod rate_limit;
pub mod rpc;
pub mod search;
pub mod service;
pub mod store;
pub mod sweep;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Error, Result};
