//! Search command implementation

use crate::error::Result;
use crate::models::{RepoIdentity, SearchHit};
use crate::service::AppContext;
use serde::Serialize;

/// Search results with the query that produced them
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchHit>,
}

/// Search projects; a blank query lists the most recently updated ones
pub async fn cmd_search(
    ctx: &AppContext,
    query: &str,
    repos: &[RepoIdentity],
    limit: Option<i64>,
) -> Result<SearchResults> {
    let results = ctx.search.search(query, repos, limit.unwrap_or(0)).await?;
    Ok(SearchResults {
        query: query.to_string(),
        results,
    })
}

/// Print search results to console
pub fn print_search_results(results: &SearchResults) {
    if results.query.trim().is_empty() {
        println!("\n🔍 Recently updated projects\n");
    } else {
        println!("\n🔍 Query: {}\n", results.query);
    }
    println!("Found {} results:\n", results.results.len());

    for (i, hit) in results.results.iter().enumerate() {
        match hit.distance {
            Some(distance) => println!(
                "{}. [distance: {:.3}] {} <{}>",
                i + 1,
                distance,
                hit.name,
                hit.repository.url()
            ),
            None => println!("{}. {} <{}>", i + 1, hit.name, hit.repository.url()),
        }
        println!(
            "   {} > {}",
            hit.collection_repository, hit.category
        );
        if !hit.description.is_empty() {
            println!("   {}\n", hit.description);
        } else {
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{config_with_dimension, repo, FakeEmbedder, FakeUpstream};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_search_after_fetch() {
        let upstream = FakeUpstream::new();
        let list = repo("a", "awesome-things");
        upstream.set_readme(
            &list,
            "## Tools\n\n- [hammer](https://github.com/t/hammer) - Hits nails\n- [saw](https://github.com/t/saw) - Cuts wood\n",
        );
        let ctx = AppContext::from_parts(
            config_with_dimension(8),
            Arc::new(MemoryStore::new()),
            Arc::new(upstream),
            Arc::new(FakeEmbedder::new(8)),
        )
        .unwrap();
        ctx.coordinator.get_collection(&list).await.unwrap();

        let results = cmd_search(&ctx, "saw: Cuts wood", &[list.clone()], Some(1))
            .await
            .unwrap();
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].name, "saw");
        assert_eq!(results.results[0].collection_repository, list);

        let recent = cmd_search(&ctx, "", &[], None).await.unwrap();
        assert_eq!(recent.results.len(), 2);
        assert!(recent.results.iter().all(|h| h.distance.is_none()));
    }
}
