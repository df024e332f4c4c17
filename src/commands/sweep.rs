//! Embedding sweep command

use crate::config::embedding_ttl;
use crate::error::Result;
use crate::progress::{finish_progress, set_progress, start_progress_bar};
use crate::service::AppContext;
use crate::sweep::SweepStats;

/// Refresh stale embeddings; `ttl_secs` overrides `cache.embedding_ttl_secs`
pub async fn cmd_sweep(ctx: &AppContext, ttl_secs: Option<i64>, show_progress: bool) -> Result<SweepStats> {
    let ttl = match ttl_secs {
        Some(secs) => embedding_ttl(secs),
        None => ctx.config.cache.embedding_ttl(),
    };

    let mut bar = None;
    let stats = ctx
        .sweep
        .run(ttl, |done, total| {
            if !show_progress {
                return;
            }
            if bar.is_none() {
                bar = start_progress_bar(total, "embedding projects");
            }
            set_progress(&bar, done);
        })
        .await?;
    finish_progress(bar, "done");

    Ok(stats)
}

pub fn print_sweep_stats(stats: &SweepStats) {
    println!("\n✓ Embedding sweep complete");
    println!("  Candidates: {}", stats.candidates);
    println!("  Embedded: {}", stats.embedded);
    if stats.failed > 0 {
        println!("  Failed: {}", stats.failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Collection, Project};
    use crate::store::{MemoryStore, Store};
    use crate::test_support::{config_with_dimension, repo, FakeEmbedder, FakeUpstream};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_backfills_missing_embeddings() {
        let store = Arc::new(MemoryStore::new());
        let collection = Collection {
            language: "Zig".to_string(),
            categories: vec![Category {
                name: "Tools".to_string(),
                projects: vec![Project {
                    name: "zls".to_string(),
                    description: "Language server".to_string(),
                    repo: repo("zigtools", "zls"),
                }],
            }],
        };
        let summary = store
            .upsert_collection(&repo("a", "awesome-zig"), &collection, false)
            .await
            .unwrap();
        assert_eq!(summary.pending_embeddings.len(), 1);

        let ctx = AppContext::from_parts(
            config_with_dimension(4),
            store.clone(),
            Arc::new(FakeUpstream::new()),
            Arc::new(FakeEmbedder::new(4)),
        )
        .unwrap();

        let stats = cmd_sweep(&ctx, None, false).await.unwrap();
        assert_eq!(stats.candidates, 1);
        assert_eq!(stats.embedded, 1);

        let again = cmd_sweep(&ctx, Some(-1), false).await.unwrap();
        assert_eq!(again.candidates, 0);
    }
}
