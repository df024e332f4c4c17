//! Hierarchical upsert of parsed collections
//!
//! The store writes repository, collection, categories and projects in one
//! transaction; embeddings for changed projects are computed afterwards and
//! are best effort. Anything that fails to embed here is picked up by the
//! refresh sweep.

use crate::embed::Embedder;
use crate::error::Result;
use crate::models::{Collection, ProjectEmbedding, ProjectText, RepoIdentity};
use crate::store::{Store, UpsertSummary};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of ingesting one collection
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    #[serde(flatten)]
    pub summary: UpsertSummary,
    pub embedded: usize,
    pub embedding_failures: usize,
}

pub struct Ingestor {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    reconcile: bool,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        reconcile: bool,
    ) -> Self {
        Self {
            store,
            embedder,
            batch_size: batch_size.max(1),
            reconcile,
        }
    }

    /// Persist `collection` as the content of `repo` and refresh embeddings
    /// of projects whose text changed.
    pub async fn upsert_collection(
        &self,
        repo: &RepoIdentity,
        collection: &Collection,
    ) -> Result<IngestOutcome> {
        let summary = self
            .store
            .upsert_collection(repo, collection, self.reconcile)
            .await?;

        info!(
            repo = %repo,
            categories = summary.categories,
            projects = summary.projects,
            pending = summary.pending_embeddings.len(),
            "Stored collection"
        );
        if summary.removed_projects > 0 || summary.removed_categories > 0 {
            info!(
                repo = %repo,
                categories = summary.removed_categories,
                projects = summary.removed_projects,
                "Removed entries no longer listed"
            );
        }

        let (embedded, embedding_failures) = self.embed_pending(&summary.pending_embeddings).await;

        Ok(IngestOutcome {
            summary,
            embedded,
            embedding_failures,
        })
    }

    async fn embed_pending(&self, pending: &[ProjectText]) -> (usize, usize) {
        let mut embedded = 0;
        let mut failed = 0;

        for batch in pending.chunks(self.batch_size) {
            let texts = batch.iter().map(ProjectText::embedding_text).collect();
            let vectors = match self.embedder.embed(texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!(error = %e, count = batch.len(), "Embedding failed; left for sweep");
                    failed += batch.len();
                    continue;
                }
            };

            let rows: Vec<ProjectEmbedding> = batch
                .iter()
                .zip(vectors)
                .map(|(project, vector)| ProjectEmbedding {
                    project_id: project.project_id,
                    content_hash: project.content_hash.clone(),
                    vector,
                })
                .collect();

            match self.store.upsert_embeddings(&rows).await {
                Ok(()) => embedded += rows.len(),
                Err(e) => {
                    warn!(error = %e, count = rows.len(), "Storing embeddings failed; left for sweep");
                    failed += rows.len();
                }
            }
        }

        debug!(embedded, failed, "Embedding pass finished");
        (embedded, failed)
    }
}
