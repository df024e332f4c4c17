//! Cache-aside fetch coordinator
//!
//! Every read goes through the same state machine: load what is stored,
//! serve it while it is younger than the TTL, otherwise fetch from upstream,
//! decode, persist and return the fresh copy. Upstream failures are never
//! papered over with stale data.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::github::Upstream;
use crate::ingest::Ingestor;
use crate::models::{
    CategorySummary, Project, ProjectStats, RepoIdentity, RepositoryCollection,
};
use crate::parse::ParseProfiles;
use crate::store::Store;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Freshness and fan-out settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// `None` means stored collections never expire
    pub collection_ttl: Option<Duration>,
    pub stats_ttl: Option<Duration>,
    pub concurrency: usize,
}

impl From<&CacheConfig> for FetchSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            collection_ttl: config.collection_ttl(),
            stats_ttl: config.stats_ttl(),
            concurrency: config.fetch_concurrency,
        }
    }
}

fn age(updated_at: DateTime<Utc>) -> Duration {
    (Utc::now() - updated_at).to_std().unwrap_or(Duration::ZERO)
}

fn is_fresh(updated_at: DateTime<Utc>, ttl: Option<Duration>) -> bool {
    match ttl {
        None => true,
        Some(ttl) => age(updated_at) < ttl,
    }
}

pub struct FetchCoordinator {
    store: Arc<dyn Store>,
    upstream: Arc<dyn Upstream>,
    ingestor: Arc<Ingestor>,
    profiles: ParseProfiles,
    settings: FetchSettings,
}

impl FetchCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn Upstream>,
        ingestor: Arc<Ingestor>,
        profiles: ParseProfiles,
        settings: FetchSettings,
    ) -> Self {
        Self {
            store,
            upstream,
            ingestor,
            profiles,
            settings,
        }
    }

    /// Collection of one repository; `None` when upstream has no such repository
    pub async fn get_collection(&self, repo: &RepoIdentity) -> Result<Option<RepositoryCollection>> {
        let repo = repo.normalized()?;
        let cached = match self.store.load_collection(&repo).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(repo = %repo, error = %e, "Loading stored collection failed; treating as miss");
                None
            }
        };

        if let Some(stored) = &cached {
            if is_fresh(stored.updated_at, self.settings.collection_ttl) {
                debug!(repo = %repo, "Serving stored collection");
                return Ok(cached);
            }
        }

        self.refresh_collection(&repo, cached.map(|c| c.updated_at))
            .await
    }

    /// Collections of many repositories.
    ///
    /// Repositories that fail to refresh are logged and left out; the call as
    /// a whole does not fail. Result order is unspecified.
    pub async fn list_collections(&self, repos: &[RepoIdentity]) -> Vec<RepositoryCollection> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(repos.len());
        for repo in repos {
            match repo.normalized() {
                Ok(repo) => {
                    if seen.insert(repo.clone()) {
                        unique.push(repo);
                    }
                }
                Err(e) => warn!(repo = %repo, error = %e, "Skipping invalid repository"),
            }
        }

        let stored = match self.store.load_collections(&unique).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Bulk load failed; refreshing every repository");
                Vec::new()
            }
        };
        let mut stored: HashMap<RepoIdentity, RepositoryCollection> = stored
            .into_iter()
            .map(|c| (c.repository.clone(), c))
            .collect();

        let mut results = Vec::with_capacity(unique.len());
        let mut misses = Vec::new();
        for repo in unique {
            match stored.remove(&repo) {
                Some(c) if is_fresh(c.updated_at, self.settings.collection_ttl) => results.push(c),
                Some(c) => misses.push((repo, Some(c.updated_at))),
                None => misses.push((repo, None)),
            }
        }

        debug!(
            fresh = results.len(),
            refresh = misses.len(),
            "Resolved stored collections"
        );

        let refreshed: Vec<(RepoIdentity, Result<Option<RepositoryCollection>>)> =
            stream::iter(misses)
                .map(|(repo, stale_since)| async move {
                    let outcome = self.refresh_collection(&repo, stale_since).await;
                    (repo, outcome)
                })
                .buffer_unordered(self.settings.concurrency.max(1))
                .collect()
                .await;

        for (repo, outcome) in refreshed {
            match outcome {
                Ok(Some(c)) => results.push(c),
                Ok(None) => debug!(repo = %repo, "Repository not found upstream"),
                Err(e) => warn!(repo = %repo, error = %e, "Omitting repository from listing"),
            }
        }

        results
    }

    /// Category names and sizes of a collection
    pub async fn list_categories(&self, repo: &RepoIdentity) -> Result<Option<Vec<CategorySummary>>> {
        Ok(self.get_collection(repo).await?.map(|c| {
            c.collection
                .categories
                .iter()
                .map(CategorySummary::from)
                .collect()
        }))
    }

    /// Projects of one category; an unknown category yields an empty list
    pub async fn list_projects(
        &self,
        repo: &RepoIdentity,
        category: &str,
    ) -> Result<Option<Vec<Project>>> {
        Ok(self.get_collection(repo).await?.map(|c| {
            c.collection
                .category(category)
                .map(|c| c.projects.clone())
                .unwrap_or_default()
        }))
    }

    /// Star and issue counts of a repository, cached like collections
    pub async fn get_project_stats(&self, repo: &RepoIdentity) -> Result<Option<ProjectStats>> {
        let repo = repo.normalized()?;
        let cached = match self.store.load_stats(&repo).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(repo = %repo, error = %e, "Loading stored stats failed; treating as miss");
                None
            }
        };

        if let Some(stored) = &cached {
            if is_fresh(stored.updated_at, self.settings.stats_ttl) {
                debug!(repo = %repo, "Serving stored stats");
                return Ok(cached);
            }
        }

        let stats = match self.upstream.get_stats(&repo).await {
            Ok(stats) => stats,
            Err(e) if e.is_not_found() => {
                info!(repo = %repo, "Repository not found upstream");
                return Ok(None);
            }
            Err(e) => {
                if let Some(stored) = &cached {
                    warn!(
                        repo = %repo,
                        age_secs = age(stored.updated_at).as_secs(),
                        "Stats refresh failed; stored stats are stale and not served"
                    );
                }
                return Err(e);
            }
        };

        match self.store.upsert_stats(&repo, stats).await {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                warn!(repo = %repo, error = %e, "Persisting stats failed");
                Ok(Some(ProjectStats {
                    repository: repo,
                    stargazers_count: stats.stargazers_count,
                    open_issue_count: stats.open_issue_count,
                    updated_at: Utc::now(),
                }))
            }
        }
    }

    async fn refresh_collection(
        &self,
        repo: &RepoIdentity,
        stale_since: Option<DateTime<Utc>>,
    ) -> Result<Option<RepositoryCollection>> {
        info!(repo = %repo, "Fetching collection from upstream");
        let bytes = match self.upstream.get_readme(repo).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                info!(repo = %repo, "Repository not found upstream");
                return Ok(None);
            }
            Err(e) => {
                if let Some(at) = stale_since {
                    warn!(
                        repo = %repo,
                        age_secs = age(at).as_secs(),
                        error = %e,
                        "Refresh failed; stored collection is stale and not served"
                    );
                }
                return Err(e);
            }
        };

        let collection = self.profiles.decode(repo, &bytes)?;

        if let Err(e) = self.ingestor.upsert_collection(repo, &collection).await {
            warn!(repo = %repo, error = %e, "Persisting collection failed; serving fetched copy");
        }

        Ok(Some(RepositoryCollection {
            repository: repo.clone(),
            collection,
            updated_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parse::ParseOptions;
    use crate::store::MemoryStore;
    use crate::test_support::{repo, FakeEmbedder, FakeUpstream};

    const DOC: &str = "# Awesome Go\n\n## Actor Model\n\n- [foo](https://github.com/x/foo) - does things\n";

    struct Harness {
        store: Arc<MemoryStore>,
        upstream: Arc<FakeUpstream>,
        coordinator: FetchCoordinator,
    }

    fn harness(collection_ttl: Option<Duration>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let upstream = Arc::new(FakeUpstream::new());
        let embedder = Arc::new(FakeEmbedder::new(4));
        let ingestor = Arc::new(Ingestor::new(store.clone(), embedder, 8, false));
        let coordinator = FetchCoordinator::new(
            store.clone(),
            upstream.clone(),
            ingestor,
            ParseProfiles::new(ParseOptions::default()),
            FetchSettings {
                collection_ttl,
                stats_ttl: Some(Duration::from_secs(3600)),
                concurrency: 4,
            },
        );
        Harness {
            store,
            upstream,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_fresh_collection_served_without_fetch() {
        let h = harness(Some(Duration::from_secs(3600)));
        let list = repo("avelino", "awesome-go");
        h.upstream.set_readme(&list, DOC);

        let first = h.coordinator.get_collection(&list).await.unwrap().unwrap();
        assert_eq!(h.upstream.readme_calls(), 1);
        assert_eq!(first.collection.language, "Go");
        assert_eq!(first.collection.categories[0].name, "Actor Model");

        let second = h.coordinator.get_collection(&list).await.unwrap().unwrap();
        assert_eq!(h.upstream.readme_calls(), 1);
        assert_eq!(second.collection, first.collection);
    }

    #[tokio::test]
    async fn test_stale_collection_is_refetched() {
        let h = harness(Some(Duration::from_secs(3600)));
        let list = repo("avelino", "awesome-go");
        h.upstream.set_readme(&list, DOC);
        h.coordinator.get_collection(&list).await.unwrap();

        h.store.backdate_collection(&list, Duration::from_secs(7200)).await;
        let before = h.store.load_collection(&list).await.unwrap().unwrap().updated_at;

        let refreshed = h.coordinator.get_collection(&list).await.unwrap().unwrap();
        assert_eq!(h.upstream.readme_calls(), 2);
        assert!(refreshed.updated_at > before);

        let stored = h.store.load_collection(&list).await.unwrap().unwrap();
        assert!(stored.updated_at > before);
    }

    #[tokio::test]
    async fn test_infinite_ttl_never_refetches() {
        let h = harness(None);
        let list = repo("avelino", "awesome-go");
        h.upstream.set_readme(&list, DOC);
        h.coordinator.get_collection(&list).await.unwrap();

        h.store
            .backdate_collection(&list, Duration::from_secs(10 * 365 * 86400))
            .await;
        h.coordinator.get_collection(&list).await.unwrap().unwrap();
        assert_eq!(h.upstream.readme_calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_masked_by_stale_data() {
        let h = harness(Some(Duration::from_secs(60)));
        let list = repo("avelino", "awesome-go");
        h.upstream.set_readme(&list, DOC);
        h.coordinator.get_collection(&list).await.unwrap();

        h.store.backdate_collection(&list, Duration::from_secs(120)).await;
        h.upstream.set_readme_failure(&list);

        let err = h.coordinator.get_collection(&list).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let h = harness(Some(Duration::from_secs(60)));
        let missing = repo("nobody", "nothing");
        h.upstream.set_readme_missing(&missing);
        assert!(h.coordinator.get_collection(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_decode_error_is_returned() {
        let h = harness(Some(Duration::from_secs(60)));
        let list = repo("x", "binary");
        h.upstream.set_readme_bytes(&list, vec![0xff, 0xfe]);
        let err = h.coordinator.get_collection(&list).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(h.store.load_collection(&list).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_collections_omits_failures() {
        let h = harness(Some(Duration::from_secs(3600)));
        let r1 = repo("a", "awesome-one");
        let r2 = repo("a", "awesome-two");
        h.upstream.set_readme(&r1, DOC);
        h.upstream.set_readme_failure(&r2);

        let listed = h
            .coordinator
            .list_collections(&[r1.clone(), r2.clone(), r1.clone()])
            .await;

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].repository, r1);
        assert_eq!(h.upstream.readme_calls(), 2);
    }

    #[tokio::test]
    async fn test_list_collections_serves_fresh_from_store() {
        let h = harness(Some(Duration::from_secs(3600)));
        let r1 = repo("a", "awesome-one");
        let r2 = repo("a", "awesome-two");
        h.upstream.set_readme(&r1, DOC);
        h.upstream.set_readme(&r2, DOC);
        h.coordinator.get_collection(&r1).await.unwrap();

        let listed = h.coordinator.list_collections(&[r1.clone(), r2.clone()]).await;
        assert_eq!(listed.len(), 2);
        // r1 was fresh, only r2 went upstream
        assert_eq!(h.upstream.readme_calls(), 2);
    }

    #[tokio::test]
    async fn test_categories_and_projects_views() {
        let h = harness(Some(Duration::from_secs(3600)));
        let list = repo("avelino", "awesome-go");
        h.upstream.set_readme(&list, DOC);

        let categories = h.coordinator.list_categories(&list).await.unwrap().unwrap();
        assert_eq!(
            categories,
            vec![CategorySummary {
                name: "Actor Model".to_string(),
                project_count: 1
            }]
        );

        let projects = h
            .coordinator
            .list_projects(&list, "actor model")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(projects[0].repo, repo("x", "foo"));
        assert_eq!(projects[0].description, "does things");

        let none = h.coordinator.list_projects(&list, "Unknown").await.unwrap().unwrap();
        assert!(none.is_empty());
        assert_eq!(h.upstream.readme_calls(), 1);
    }

    #[tokio::test]
    async fn test_project_stats_cache_aside() {
        let h = harness(None);
        let project = repo("x", "foo");
        h.upstream.set_stats(&project, 10, 2);

        let first = h.coordinator.get_project_stats(&project).await.unwrap().unwrap();
        assert_eq!(first.stargazers_count, 10);
        h.coordinator.get_project_stats(&project).await.unwrap();
        assert_eq!(h.upstream.stats_calls(), 1);

        h.store.backdate_stats(&project, Duration::from_secs(7200)).await;
        h.upstream.set_stats(&project, 11, 3);
        let refreshed = h.coordinator.get_project_stats(&project).await.unwrap().unwrap();
        assert_eq!(refreshed.stargazers_count, 11);
        assert_eq!(h.upstream.stats_calls(), 2);

        h.store.backdate_stats(&project, Duration::from_secs(7200)).await;
        h.upstream.set_stats_failure(&project);
        assert!(h.coordinator.get_project_stats(&project).await.is_err());
    }
}
