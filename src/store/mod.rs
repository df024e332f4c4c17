//! Persistence for the repository → collection → category → project hierarchy
//!
//! The [`Store`] trait is implemented by:
//! - [`PgStore`]: PostgreSQL with pgvector, the production backend
//! - [`MemoryStore`]: an in-process backend with the same semantics

mod identity;
mod memory;
mod postgres;
mod schema;

pub use identity::upsert_repositories;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use schema::schema_sql;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    Collection, ProjectEmbedding, ProjectStats, ProjectText, RepoIdentity, RepoStats, Repository,
    RepositoryCollection, SearchHit,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Outcome of persisting one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub repository_id: i64,
    pub collection_id: i64,
    pub categories: usize,
    pub projects: usize,
    /// Projects whose stored embedding is missing or was computed from other text
    pub pending_embeddings: Vec<ProjectText>,
    /// Rows deleted by reconciliation (always zero in append-only mode)
    pub removed_categories: u64,
    pub removed_projects: u64,
}

/// A bound search: optional vector plus repository filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    /// Collection repositories to restrict to; empty means all
    pub filters: Vec<RepoIdentity>,
    pub embedding: Option<Vec<f32>>,
    pub limit: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Create tables and indexes if they do not exist
    async fn init_schema(&self) -> Result<()>;

    /// Resolve-or-insert repositories, one result per input in input order
    async fn upsert_repositories(&self, identities: &[RepoIdentity]) -> Result<Vec<Repository>>;

    /// Persist a parsed collection atomically
    async fn upsert_collection(
        &self,
        repo: &RepoIdentity,
        collection: &Collection,
        reconcile: bool,
    ) -> Result<UpsertSummary>;

    async fn load_collection(&self, repo: &RepoIdentity) -> Result<Option<RepositoryCollection>>;

    /// Bulk load; repositories without a stored collection are absent from the result
    async fn load_collections(
        &self,
        repos: &[RepoIdentity],
    ) -> Result<Vec<RepositoryCollection>>;

    async fn load_stats(&self, repo: &RepoIdentity) -> Result<Option<ProjectStats>>;

    async fn upsert_stats(&self, repo: &RepoIdentity, stats: RepoStats) -> Result<ProjectStats>;

    /// Projects with no embedding, a content mismatch, or an embedding older than `ttl`
    async fn list_stale_embeddings(&self, ttl: Option<Duration>) -> Result<Vec<ProjectText>>;

    async fn upsert_embeddings(&self, embeddings: &[ProjectEmbedding]) -> Result<()>;

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;
}

/// Open the backend named by `database_url`
pub async fn connect(config: &Config) -> Result<Arc<dyn Store>> {
    let url = config.database_url.trim();
    if url.starts_with("memory://") {
        info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let store = PgStore::connect(url, config.embedding.dimension).await?;
        return Ok(Arc::new(store));
    }
    Err(Error::Config(format!(
        "Unsupported database_url '{}'; expected postgres:// or memory://",
        url
    )))
}

/// De-duplicate projects within each category by linked repository (first wins)
pub(crate) fn dedupe_projects(collection: &Collection) -> Collection {
    let mut cleaned = collection.clone();
    for category in &mut cleaned.categories {
        let mut seen = std::collections::HashSet::new();
        category.projects.retain(|p| seen.insert(p.repo.clone()));
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = Config {
            database_url: "memory://".to_string(),
            ..Default::default()
        };
        let store = connect(&config).await.unwrap();
        assert!(store.load_collection(&crate::test_support::repo("a", "b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let config = Config {
            database_url: "sqlite://index.db".to_string(),
            ..Default::default()
        };
        assert!(matches!(connect(&config).await, Err(Error::Config(_))));
    }
}
