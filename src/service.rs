//! Component wiring shared by the CLI and the RPC server

use crate::config::Config;
use crate::embed::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::fetch::{FetchCoordinator, FetchSettings};
use crate::github::{create_upstream, Upstream};
use crate::ingest::Ingestor;
use crate::parse::ParseProfiles;
use crate::rpc::RpcServer;
use crate::search::SearchEngine;
use crate::store::{self, Store};
use crate::sweep::EmbeddingSweep;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Fully constructed service graph
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub embedder: Arc<dyn Embedder>,
    pub coordinator: Arc<FetchCoordinator>,
    pub search: Arc<SearchEngine>,
    pub sweep: EmbeddingSweep,
}

impl AppContext {
    /// Connect the store and build the configured collaborators
    pub async fn connect(config: Config) -> Result<Self> {
        let store = store::connect(&config).await?;
        let upstream = create_upstream(&config.github)?;
        let embedder = create_embedder(&config.embedding)?;
        Self::from_parts(config, store, upstream, embedder)
    }

    /// Assemble the graph around existing collaborators
    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        upstream: Arc<dyn Upstream>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if embedder.dimension() != config.embedding.dimension {
            return Err(Error::Config(format!(
                "embedding model '{}' produces {} dimensions but embedding.dimension is {}",
                embedder.model_name(),
                embedder.dimension(),
                config.embedding.dimension
            )));
        }
        info!(
            model = embedder.model_name(),
            dimension = embedder.dimension(),
            "Embedding backend ready"
        );

        let profiles = ParseProfiles::from_config(&config)?;
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            embedder.clone(),
            config.embedding.batch_size,
            config.cache.reconcile_orphans,
        ));
        let coordinator = Arc::new(FetchCoordinator::new(
            store.clone(),
            upstream,
            ingestor,
            profiles,
            FetchSettings::from(&config.cache),
        ));
        let search = Arc::new(SearchEngine::new(
            store.clone(),
            embedder.clone(),
            &config.search,
        ));
        let sweep = EmbeddingSweep::new(store.clone(), embedder.clone(), config.embedding.batch_size);

        Ok(Self {
            config,
            store,
            embedder,
            coordinator,
            search,
            sweep,
        })
    }

    pub fn rpc_server(&self) -> RpcServer {
        RpcServer::new(
            self.coordinator.clone(),
            self.search.clone(),
            Duration::from_secs(self.config.rpc.request_timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListConfig;
    use crate::store::MemoryStore;
    use crate::test_support::{config_with_dimension, repo, FakeEmbedder, FakeUpstream};

    #[tokio::test]
    async fn test_list_overrides_reach_the_coordinator() {
        let mut config = config_with_dimension(4);
        config.lists.push(ListConfig {
            hostname: "github.com".to_string(),
            owner: "a".to_string(),
            repo: "list".to_string(),
            start_section: Some("Libraries".to_string()),
            end_section: None,
            sub_headings_as_categories: None,
        });

        let upstream = Arc::new(FakeUpstream::new());
        let list = repo("a", "list");
        upstream.set_readme(
            &list,
            "## Contents\n\n- [x](https://github.com/x/skipped)\n\n## Libraries\n\n- [y](https://github.com/x/kept)\n",
        );

        let context = AppContext::from_parts(
            config,
            Arc::new(MemoryStore::new()),
            upstream,
            Arc::new(FakeEmbedder::new(4)),
        )
        .unwrap();

        let collection = context.coordinator.get_collection(&list).await.unwrap().unwrap();
        let names: Vec<&str> = collection
            .collection
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Libraries"]);
    }

    #[test]
    fn test_embedder_dimension_must_match_config() {
        let result = AppContext::from_parts(
            config_with_dimension(384),
            Arc::new(MemoryStore::new()),
            Arc::new(FakeUpstream::new()),
            Arc::new(FakeEmbedder::new(8)),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
