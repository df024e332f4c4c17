//! Embedding refresh sweep
//!
//! Backfills missing embeddings, replaces embeddings computed from outdated
//! project text and, with a TTL, re-embeds anything older than it.

use crate::embed::Embedder;
use crate::error::Result;
use crate::models::{ProjectEmbedding, ProjectText};
use crate::store::Store;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub candidates: usize,
    pub embedded: usize,
    pub failed: usize,
}

pub struct EmbeddingSweep {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl EmbeddingSweep {
    pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            store,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Refresh every stale embedding; `on_progress` receives processed counts
    pub async fn run(
        &self,
        ttl: Option<Duration>,
        mut on_progress: impl FnMut(usize, usize) + Send,
    ) -> Result<SweepStats> {
        let candidates = self.store.list_stale_embeddings(ttl).await?;
        let mut stats = SweepStats {
            candidates: candidates.len(),
            ..Default::default()
        };
        info!(candidates = stats.candidates, ttl = ?ttl, "Starting embedding sweep");

        let mut processed = 0;
        for batch in candidates.chunks(self.batch_size) {
            let rows = self.embed_batch(batch).await;
            let failed_here = batch.len() - rows.len();
            stats.failed += failed_here;

            if !rows.is_empty() {
                match self.store.upsert_embeddings(&rows).await {
                    Ok(()) => stats.embedded += rows.len(),
                    Err(e) => {
                        warn!(error = %e, count = rows.len(), "Storing embeddings failed");
                        stats.failed += rows.len();
                    }
                }
            }

            processed += batch.len();
            on_progress(processed, stats.candidates);
        }

        info!(
            embedded = stats.embedded,
            failed = stats.failed,
            "Embedding sweep finished"
        );
        Ok(stats)
    }

    /// Embed a batch, falling back to one request per project if the batch fails
    async fn embed_batch(&self, batch: &[ProjectText]) -> Vec<ProjectEmbedding> {
        let texts: Vec<String> = batch.iter().map(ProjectText::embedding_text).collect();
        match self.embedder.embed(texts).await {
            Ok(vectors) => return zip_rows(batch, vectors),
            Err(e) => {
                warn!(error = %e, count = batch.len(), "Batch embedding failed; retrying items individually");
            }
        }

        let mut rows = Vec::with_capacity(batch.len());
        for project in batch {
            match self.embedder.embed(vec![project.embedding_text()]).await {
                Ok(vectors) => rows.extend(zip_rows(std::slice::from_ref(project), vectors)),
                Err(e) => {
                    debug!(project_id = project.project_id, error = %e, "Embedding failed");
                }
            }
        }
        rows
    }
}

fn zip_rows(batch: &[ProjectText], vectors: Vec<Vec<f32>>) -> Vec<ProjectEmbedding> {
    batch
        .iter()
        .zip(vectors)
        .map(|(project, vector)| ProjectEmbedding {
            project_id: project.project_id,
            content_hash: project.content_hash.clone(),
            vector,
        })
        .collect()
}
