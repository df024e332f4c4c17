//! Project search
//!
//! A non-empty query is embedded once and matched by cosine distance; an
//! empty query lists the most recently updated projects.

pub mod query;

use crate::config::SearchConfig;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::models::{RepoIdentity, SearchHit};
use crate::store::{SearchRequest, Store};
use std::sync::Arc;
use tracing::debug;

pub struct SearchEngine {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    default_limit: i64,
    max_limit: i64,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn Embedder>, config: &SearchConfig) -> Self {
        Self {
            store,
            embedder,
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }

    /// Search projects, optionally restricted to collections of `filters`
    pub async fn search(
        &self,
        query: &str,
        filters: &[RepoIdentity],
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let filters = filters
            .iter()
            .map(RepoIdentity::normalized)
            .collect::<Result<Vec<_>>>()?;
        let limit = query::effective_limit(limit, self.default_limit, self.max_limit);

        let query = query.trim();
        let embedding = if query.is_empty() {
            None
        } else {
            let mut vectors = self.embedder.embed(vec![query.to_string()]).await?;
            let vector = vectors
                .pop()
                .ok_or_else(|| Error::Embedding("no vector returned for query".to_string()))?;
            Some(vector)
        };

        debug!(
            semantic = embedding.is_some(),
            filters = filters.len(),
            limit,
            "Searching projects"
        );

        self.store
            .search(&SearchRequest {
                filters,
                embedding,
                limit,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::ingest::Ingestor;
    use crate::models::{Category, Collection, Project};
    use crate::store::MemoryStore;
    use crate::test_support::{repo, FakeEmbedder};

    async fn seeded() -> (Arc<MemoryStore>, Arc<FakeEmbedder>) {
        let store = Arc::new(MemoryStore::new());
        let embedder = Arc::new(FakeEmbedder::new(16));
        let ingestor = Ingestor::new(store.clone(), embedder.clone(), 8, false);

        for (list, names) in [
            (repo("a", "awesome-go"), vec!["gin", "echo"]),
            (repo("a", "awesome-rust"), vec!["axum", "actix"]),
        ] {
            let collection = Collection {
                language: String::new(),
                categories: vec![Category {
                    name: "Web".to_string(),
                    projects: names
                        .iter()
                        .map(|name| Project {
                            name: name.to_string(),
                            description: String::new(),
                            repo: repo("x", name),
                        })
                        .collect(),
                }],
            };
            ingestor.upsert_collection(&list, &collection).await.unwrap();
        }
        (store, embedder)
    }

    fn engine(store: Arc<MemoryStore>, embedder: Arc<FakeEmbedder>) -> SearchEngine {
        SearchEngine::new(store, embedder, &SearchConfig::default())
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_embedding_call() {
        let (store, embedder) = seeded().await;
        let before = embedder.calls();
        let engine = engine(store, embedder.clone());

        let hits = engine.search("   ", &[], 0).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|h| h.distance.is_none()));
        assert_eq!(embedder.calls(), before);
    }

    #[tokio::test]
    async fn test_query_makes_exactly_one_embedding_call() {
        let (store, embedder) = seeded().await;
        let before = embedder.calls();
        let engine = engine(store, embedder.clone());

        // embedding text of a project without description is its name
        let hits = engine.search("axum", &[], 2).await.unwrap();
        assert_eq!(embedder.calls(), before + 1);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "axum");
        assert!(hits[0].distance.unwrap() < 1e-6);
    }

    #[tokio::test]
    async fn test_filters_restrict_collections() {
        let (store, embedder) = seeded().await;
        let engine = engine(store, embedder);
        let go = repo("a", "awesome-go");

        let hits = engine.search("axum", &[go.clone()], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.collection_repository == go));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_search() {
        let (store, embedder) = seeded().await;
        embedder.fail_all(true);
        let engine = engine(store, embedder);

        let err = engine.search("web framework", &[], 10).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let (store, embedder) = seeded().await;
        let engine = SearchEngine::new(
            store,
            embedder,
            &SearchConfig {
                default_limit: 3,
                max_limit: 3,
            },
        );
        assert_eq!(engine.search("", &[], 0).await.unwrap().len(), 3);
        assert_eq!(engine.search("", &[], 100).await.unwrap().len(), 3);
        assert_eq!(engine.search("", &[], 1).await.unwrap().len(), 1);
    }
}
