use super::{dedupe_projects, SearchRequest, Store, UpsertSummary};
use crate::error::Result;
use crate::models::{
    Category, Collection, Project, ProjectEmbedding, ProjectStats, ProjectText, RepoIdentity,
    RepoStats, Repository, RepositoryCollection, SearchHit,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

struct CollectionRecord {
    id: i64,
    language: String,
    updated_at: DateTime<Utc>,
}

struct CategoryRecord {
    collection_id: i64,
    name: String,
}

struct ProjectRecord {
    category_id: i64,
    repository_id: i64,
    name: String,
    description: String,
    content_hash: String,
    updated_at: DateTime<Utc>,
}

struct EmbeddingRecord {
    content_hash: String,
    vector: Vec<f32>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    repositories: BTreeMap<i64, RepoIdentity>,
    repository_ids: HashMap<RepoIdentity, i64>,
    /// keyed by repository id
    collections: HashMap<i64, CollectionRecord>,
    categories: BTreeMap<i64, CategoryRecord>,
    projects: BTreeMap<i64, ProjectRecord>,
    /// keyed by repository id
    stats: HashMap<i64, (RepoStats, DateTime<Utc>)>,
    /// keyed by project id
    embeddings: HashMap<i64, EmbeddingRecord>,
}

impl State {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn resolve(&mut self, identity: &RepoIdentity) -> i64 {
        if let Some(id) = self.repository_ids.get(identity) {
            return *id;
        }
        let id = self.allocate();
        self.repositories.insert(id, identity.clone());
        self.repository_ids.insert(identity.clone(), id);
        id
    }

    fn collection_for(&self, repository_id: i64) -> Option<RepositoryCollection> {
        let record = self.collections.get(&repository_id)?;
        let repository = self.repositories.get(&repository_id)?.clone();

        let categories = self
            .categories
            .iter()
            .filter(|(_, c)| c.collection_id == record.id)
            .map(|(category_id, c)| Category {
                name: c.name.clone(),
                projects: self
                    .projects
                    .values()
                    .filter(|p| p.category_id == *category_id)
                    .filter_map(|p| {
                        Some(Project {
                            name: p.name.clone(),
                            description: p.description.clone(),
                            repo: self.repositories.get(&p.repository_id)?.clone(),
                        })
                    })
                    .collect(),
            })
            .collect();

        Some(RepositoryCollection {
            repository,
            collection: Collection {
                language: record.language.clone(),
                categories,
            },
            updated_at: record.updated_at,
        })
    }

    fn is_stale(&self, project_id: i64, project: &ProjectRecord, ttl: Option<Duration>) -> bool {
        match self.embeddings.get(&project_id) {
            None => true,
            Some(e) if e.content_hash != project.content_hash => true,
            Some(e) => ttl.is_some_and(|ttl| age(e.updated_at) > ttl),
        }
    }
}

fn age(at: DateTime<Utc>) -> Duration {
    (Utc::now() - at).to_std().unwrap_or(Duration::ZERO)
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// In-process store with the same semantics as [`super::PgStore`]
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift a stored collection's timestamp into the past
    #[cfg(test)]
    pub(crate) async fn backdate_collection(&self, repo: &RepoIdentity, by: Duration) {
        let mut state = self.state.write().await;
        if let Some(id) = state.repository_ids.get(repo).copied() {
            if let Some(record) = state.collections.get_mut(&id) {
                record.updated_at -= chrono::Duration::from_std(by).unwrap();
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn backdate_stats(&self, repo: &RepoIdentity, by: Duration) {
        let mut state = self.state.write().await;
        if let Some(id) = state.repository_ids.get(repo).copied() {
            if let Some((_, at)) = state.stats.get_mut(&id) {
                *at -= chrono::Duration::from_std(by).unwrap();
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn backdate_embeddings(&self, by: Duration) {
        let mut state = self.state.write().await;
        for record in state.embeddings.values_mut() {
            record.updated_at -= chrono::Duration::from_std(by).unwrap();
        }
    }

    #[cfg(test)]
    pub(crate) async fn embedding_count(&self) -> usize {
        self.state.read().await.embeddings.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_repositories(&self, identities: &[RepoIdentity]) -> Result<Vec<Repository>> {
        let normalized = identities
            .iter()
            .map(RepoIdentity::normalized)
            .collect::<Result<Vec<_>>>()?;
        let mut state = self.state.write().await;
        Ok(normalized
            .into_iter()
            .map(|identity| Repository {
                id: state.resolve(&identity),
                identity,
            })
            .collect())
    }

    async fn upsert_collection(
        &self,
        repo: &RepoIdentity,
        collection: &Collection,
        reconcile: bool,
    ) -> Result<UpsertSummary> {
        // validate before touching state
        let repo = repo.normalized()?;
        let mut collection = collection.clone();
        for category in &mut collection.categories {
            for project in &mut category.projects {
                project.repo = project.repo.normalized()?;
            }
        }
        let collection = dedupe_projects(&collection);

        let now = Utc::now();
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let repository_id = state.resolve(&repo);

        let collection_id = match state.collections.get_mut(&repository_id) {
            Some(record) => {
                record.language = collection.language.clone();
                record.updated_at = now;
                record.id
            }
            None => {
                let id = state.allocate();
                state.collections.insert(
                    repository_id,
                    CollectionRecord {
                        id,
                        language: collection.language.clone(),
                        updated_at: now,
                    },
                );
                id
            }
        };

        let mut category_ids = HashSet::new();
        let mut projects = 0usize;
        let mut removed_projects = 0u64;

        for category in &collection.categories {
            let existing = state
                .categories
                .iter()
                .find(|(_, c)| c.collection_id == collection_id && c.name == category.name)
                .map(|(id, _)| *id);
            let category_id = match existing {
                Some(id) => id,
                None => {
                    let id = state.allocate();
                    state.categories.insert(
                        id,
                        CategoryRecord {
                            collection_id,
                            name: category.name.clone(),
                        },
                    );
                    id
                }
            };
            category_ids.insert(category_id);

            let mut listed = HashSet::new();
            for project in &category.projects {
                let repository_id = state.resolve(&project.repo);
                listed.insert(repository_id);
                let existing = state
                    .projects
                    .iter()
                    .find(|(_, p)| p.category_id == category_id && p.repository_id == repository_id)
                    .map(|(id, _)| *id);
                let record = ProjectRecord {
                    category_id,
                    repository_id,
                    name: project.name.clone(),
                    description: project.description.clone(),
                    content_hash: project.content_hash(),
                    updated_at: now,
                };
                let id = match existing {
                    Some(id) => id,
                    None => state.allocate(),
                };
                state.projects.insert(id, record);
                projects += 1;
            }

            if reconcile {
                let orphans: Vec<i64> = state
                    .projects
                    .iter()
                    .filter(|(_, p)| p.category_id == category_id && !listed.contains(&p.repository_id))
                    .map(|(id, _)| *id)
                    .collect();
                for id in orphans {
                    state.projects.remove(&id);
                    state.embeddings.remove(&id);
                    removed_projects += 1;
                }
            }
        }

        let mut removed_categories = 0u64;
        if reconcile {
            let orphans: Vec<i64> = state
                .categories
                .iter()
                .filter(|(id, c)| c.collection_id == collection_id && !category_ids.contains(*id))
                .map(|(id, _)| *id)
                .collect();
            for category_id in orphans {
                state.categories.remove(&category_id);
                let projects: Vec<i64> = state
                    .projects
                    .iter()
                    .filter(|(_, p)| p.category_id == category_id)
                    .map(|(id, _)| *id)
                    .collect();
                for id in projects {
                    state.projects.remove(&id);
                    state.embeddings.remove(&id);
                }
                removed_categories += 1;
            }
        }

        let in_collection: HashSet<i64> = state
            .categories
            .iter()
            .filter(|(_, c)| c.collection_id == collection_id)
            .map(|(id, _)| *id)
            .collect();
        let pending_embeddings = state
            .projects
            .iter()
            .filter(|(_, p)| in_collection.contains(&p.category_id))
            .filter(|(id, p)| state.is_stale(**id, p, None))
            .map(|(id, p)| ProjectText {
                project_id: *id,
                name: p.name.clone(),
                description: p.description.clone(),
                content_hash: p.content_hash.clone(),
            })
            .collect();

        Ok(UpsertSummary {
            repository_id,
            collection_id,
            categories: collection.categories.len(),
            projects,
            pending_embeddings,
            removed_categories,
            removed_projects,
        })
    }

    async fn load_collection(&self, repo: &RepoIdentity) -> Result<Option<RepositoryCollection>> {
        let repo = repo.normalized()?;
        let state = self.state.read().await;
        Ok(state
            .repository_ids
            .get(&repo)
            .and_then(|id| state.collection_for(*id)))
    }

    async fn load_collections(
        &self,
        repos: &[RepoIdentity],
    ) -> Result<Vec<RepositoryCollection>> {
        let repos = repos
            .iter()
            .map(RepoIdentity::normalized)
            .collect::<Result<Vec<_>>>()?;
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        Ok(repos
            .iter()
            .filter_map(|repo| state.repository_ids.get(repo))
            .filter(|id| seen.insert(**id))
            .filter_map(|id| state.collection_for(*id))
            .collect())
    }

    async fn load_stats(&self, repo: &RepoIdentity) -> Result<Option<ProjectStats>> {
        let repo = repo.normalized()?;
        let state = self.state.read().await;
        Ok(state
            .repository_ids
            .get(&repo)
            .and_then(|id| state.stats.get(id))
            .map(|(stats, at)| ProjectStats {
                repository: repo.clone(),
                stargazers_count: stats.stargazers_count,
                open_issue_count: stats.open_issue_count,
                updated_at: *at,
            }))
    }

    async fn upsert_stats(&self, repo: &RepoIdentity, stats: RepoStats) -> Result<ProjectStats> {
        let repo = repo.normalized()?;
        let now = Utc::now();
        let mut state = self.state.write().await;
        let id = state.resolve(&repo);
        state.stats.insert(id, (stats, now));
        Ok(ProjectStats {
            repository: repo,
            stargazers_count: stats.stargazers_count,
            open_issue_count: stats.open_issue_count,
            updated_at: now,
        })
    }

    async fn list_stale_embeddings(&self, ttl: Option<Duration>) -> Result<Vec<ProjectText>> {
        let state = self.state.read().await;
        Ok(state
            .projects
            .iter()
            .filter(|(id, p)| state.is_stale(**id, p, ttl))
            .map(|(id, p)| ProjectText {
                project_id: *id,
                name: p.name.clone(),
                description: p.description.clone(),
                content_hash: p.content_hash.clone(),
            })
            .collect())
    }

    async fn upsert_embeddings(&self, embeddings: &[ProjectEmbedding]) -> Result<()> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        for embedding in embeddings {
            if !state.projects.contains_key(&embedding.project_id) {
                continue;
            }
            state.embeddings.insert(
                embedding.project_id,
                EmbeddingRecord {
                    content_hash: embedding.content_hash.clone(),
                    vector: embedding.vector.clone(),
                    updated_at: now,
                },
            );
        }
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let filters = request
            .filters
            .iter()
            .map(RepoIdentity::normalized)
            .collect::<Result<HashSet<_>>>()?;
        let state = self.state.read().await;

        let collection_repos: HashMap<i64, &RepoIdentity> = state
            .collections
            .iter()
            .filter_map(|(repository_id, c)| Some((c.id, state.repositories.get(repository_id)?)))
            .collect();

        let mut hits: Vec<SearchHit> = Vec::new();
        for (project_id, project) in &state.projects {
            let Some(category) = state.categories.get(&project.category_id) else {
                continue;
            };
            let Some(collection_repo) = collection_repos.get(&category.collection_id) else {
                continue;
            };
            if !filters.is_empty() && !filters.contains(*collection_repo) {
                continue;
            }
            let Some(repository) = state.repositories.get(&project.repository_id) else {
                continue;
            };

            let distance = match &request.embedding {
                Some(query) => match state.embeddings.get(project_id) {
                    Some(e) => Some(cosine_distance(query, &e.vector)),
                    None => continue,
                },
                None => None,
            };

            hits.push(SearchHit {
                project_id: *project_id,
                name: project.name.clone(),
                description: project.description.clone(),
                repository: repository.clone(),
                category: category.name.clone(),
                collection_repository: (*collection_repo).clone(),
                distance,
                updated_at: project.updated_at,
            });
        }

        if request.embedding.is_some() {
            hits.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.project_id.cmp(&b.project_id))
            });
        } else {
            hits.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then(b.project_id.cmp(&a.project_id))
            });
        }
        hits.truncate(request.limit.max(0) as usize);
        Ok(hits)
    }
}
