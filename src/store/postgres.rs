use super::{dedupe_projects, identity, schema, SearchRequest, Store, UpsertSummary};
use crate::error::Result;
use crate::models::{
    Category, Collection, Project, ProjectEmbedding, ProjectStats, ProjectText, RepoIdentity,
    RepoStats, Repository, RepositoryCollection, SearchHit,
};
use crate::search::query::{build_search_statement, SearchArg};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
    dimension: usize,
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    collection_id: i64,
    hostname: String,
    owner: String,
    repo: String,
    language: String,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    collection_id: i64,
    category_id: i64,
    category: String,
    project_id: Option<i64>,
    name: Option<String>,
    description: Option<String>,
    hostname: Option<String>,
    owner: Option<String>,
    repo: Option<String>,
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    stargazers_count: i64,
    open_issue_count: i64,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ProjectTextRow {
    project_id: i64,
    name: String,
    description: String,
    content_hash: String,
}

impl From<ProjectTextRow> for ProjectText {
    fn from(row: ProjectTextRow) -> Self {
        Self {
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            content_hash: row.content_hash,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SearchRow {
    project_id: i64,
    name: String,
    description: String,
    project_hostname: String,
    project_owner: String,
    project_repo: String,
    category: String,
    collection_hostname: String,
    collection_owner: String,
    collection_repo: String,
    updated_at: DateTime<Utc>,
    distance: Option<f64>,
}

impl From<SearchRow> for SearchHit {
    fn from(row: SearchRow) -> Self {
        Self {
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            repository: RepoIdentity {
                hostname: row.project_hostname,
                owner: row.project_owner,
                repo: row.project_repo,
            },
            category: row.category,
            collection_repository: RepoIdentity {
                hostname: row.collection_hostname,
                owner: row.collection_owner,
                repo: row.collection_repo,
            },
            distance: row.distance,
            updated_at: row.updated_at,
        }
    }
}

impl PgStore {
    /// Connect to PostgreSQL
    pub async fn connect(url: &str, dimension: usize) -> Result<Self> {
        debug!("Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        Ok(Self { pool, dimension })
    }

    /// Load collections with their categories and projects, keyed by collection id
    async fn load_rows(&self, repos: &[RepoIdentity]) -> Result<Vec<RepositoryCollection>> {
        if repos.is_empty() {
            return Ok(Vec::new());
        }
        let hostnames: Vec<&str> = repos.iter().map(|r| r.hostname.as_str()).collect();
        let owners: Vec<&str> = repos.iter().map(|r| r.owner.as_str()).collect();
        let names: Vec<&str> = repos.iter().map(|r| r.repo.as_str()).collect();

        let collections: Vec<CollectionRow> = sqlx::query_as(
            r#"
SELECT col.id AS collection_id, r.hostname, r.owner, r.repo, col.language, col.updated_at
FROM unnest($1::text[], $2::text[], $3::text[]) AS t(hostname, owner, repo)
JOIN repository r ON r.hostname = t.hostname AND r.owner = t.owner AND r.repo = t.repo
JOIN collection col ON col.repository_id = r.id
            "#,
        )
        .bind(&hostnames)
        .bind(&owners)
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;

        if collections.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = collections.iter().map(|c| c.collection_id).collect();
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r#"
SELECT c.collection_id, c.id AS category_id, c.name AS category,
       p.id AS project_id, p.name, p.description, pr.hostname, pr.owner, pr.repo
FROM category c
LEFT JOIN project p ON p.category_id = c.id
LEFT JOIN repository pr ON pr.id = p.repository_id
WHERE c.collection_id = ANY($1)
ORDER BY c.collection_id, c.id, p.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut categories: HashMap<i64, Vec<(i64, Category)>> = HashMap::new();
        for row in rows {
            let list = categories.entry(row.collection_id).or_default();
            if list.last().map(|(id, _)| *id) != Some(row.category_id) {
                list.push((
                    row.category_id,
                    Category {
                        name: row.category,
                        projects: Vec::new(),
                    },
                ));
            }
            if let (Some(_), Some(name), Some(hostname), Some(owner), Some(repo)) =
                (row.project_id, row.name, row.hostname, row.owner, row.repo)
            {
                if let Some((_, category)) = list.last_mut() {
                    category.projects.push(Project {
                        name,
                        description: row.description.unwrap_or_default(),
                        repo: RepoIdentity {
                            hostname,
                            owner,
                            repo,
                        },
                    });
                }
            }
        }

        Ok(collections
            .into_iter()
            .map(|row| RepositoryCollection {
                repository: RepoIdentity {
                    hostname: row.hostname,
                    owner: row.owner,
                    repo: row.repo,
                },
                collection: Collection {
                    language: row.language,
                    categories: categories
                        .remove(&row.collection_id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(_, c)| c)
                        .collect(),
                },
                updated_at: row.updated_at,
            })
            .collect())
    }
}

/// Steps run inside the collection transaction
async fn write_collection(
    conn: &mut PgConnection,
    repo: &RepoIdentity,
    collection: &Collection,
    reconcile: bool,
) -> Result<UpsertSummary> {
    // owner and linked repositories in one sorted round-trip
    let identities: Vec<RepoIdentity> = std::iter::once(repo.clone())
        .chain(
            collection
                .categories
                .iter()
                .flat_map(|c| c.projects.iter().map(|p| p.repo.clone())),
        )
        .collect();
    let mut resolved = identity::upsert_repositories(conn, &identities)
        .await?
        .into_iter();
    let repository_id = resolved
        .next()
        .map(|r| r.id)
        .ok_or(crate::error::Error::Database(sqlx::Error::RowNotFound))?;

    let collection_id: i64 = sqlx::query_scalar(
        r#"
INSERT INTO collection (repository_id, language)
VALUES ($1, $2)
ON CONFLICT (repository_id) DO UPDATE SET language = EXCLUDED.language, updated_at = now()
RETURNING id
        "#,
    )
    .bind(repository_id)
    .bind(&collection.language)
    .fetch_one(&mut *conn)
    .await?;

    let mut category_ids = Vec::with_capacity(collection.categories.len());
    let mut projects = 0usize;
    let mut removed_projects = 0u64;

    for category in &collection.categories {
        let category_id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO category (collection_id, name)
VALUES ($1, $2)
ON CONFLICT (collection_id, name) DO UPDATE SET updated_at = now()
RETURNING id
            "#,
        )
        .bind(collection_id)
        .bind(&category.name)
        .fetch_one(&mut *conn)
        .await?;
        category_ids.push(category_id);

        // document order; the collection row lock taken above already
        // serializes writers of this category's projects
        let repository_ids: Vec<i64> = resolved
            .by_ref()
            .take(category.projects.len())
            .map(|r: Repository| r.id)
            .collect();
        let names: Vec<&str> = category.projects.iter().map(|p| p.name.as_str()).collect();
        let descriptions: Vec<&str> = category
            .projects
            .iter()
            .map(|p| p.description.as_str())
            .collect();
        let hashes: Vec<String> = category.projects.iter().map(Project::content_hash).collect();

        if !repository_ids.is_empty() {
            sqlx::query(
                r#"
INSERT INTO project (category_id, repository_id, name, description, content_hash)
SELECT $1, repository_id, name, description, content_hash
FROM unnest($2::bigint[], $3::text[], $4::text[], $5::text[])
    WITH ORDINALITY AS t(repository_id, name, description, content_hash, ord)
ORDER BY ord
ON CONFLICT (category_id, repository_id) DO UPDATE SET
    name = EXCLUDED.name,
    description = EXCLUDED.description,
    content_hash = EXCLUDED.content_hash,
    updated_at = now()
                "#,
            )
            .bind(category_id)
            .bind(&repository_ids)
            .bind(&names)
            .bind(&descriptions)
            .bind(&hashes)
            .execute(&mut *conn)
            .await?;
        }
        projects += repository_ids.len();

        if reconcile {
            removed_projects += sqlx::query(
                "DELETE FROM project WHERE category_id = $1 AND NOT (repository_id = ANY($2))",
            )
            .bind(category_id)
            .bind(&repository_ids)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        }
    }

    let mut removed_categories = 0u64;
    if reconcile {
        removed_categories =
            sqlx::query("DELETE FROM category WHERE collection_id = $1 AND NOT (id = ANY($2))")
                .bind(collection_id)
                .bind(&category_ids)
                .execute(&mut *conn)
                .await?
                .rows_affected();
    }

    let pending: Vec<ProjectTextRow> = sqlx::query_as(
        r#"
SELECT p.id AS project_id, p.name, p.description, p.content_hash
FROM project p
JOIN category c ON c.id = p.category_id
LEFT JOIN project_embedding e ON e.project_id = p.id
WHERE c.collection_id = $1
  AND (e.id IS NULL OR e.content_hash <> p.content_hash)
ORDER BY p.id
        "#,
    )
    .bind(collection_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(UpsertSummary {
        repository_id,
        collection_id,
        categories: collection.categories.len(),
        projects,
        pending_embeddings: pending.into_iter().map(ProjectText::from).collect(),
        removed_categories,
        removed_projects,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn init_schema(&self) -> Result<()> {
        info!(dimension = self.dimension, "Initializing database schema");
        sqlx::raw_sql(&schema::schema_sql(self.dimension))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_repositories(&self, identities: &[RepoIdentity]) -> Result<Vec<Repository>> {
        let mut conn = self.pool.acquire().await?;
        identity::upsert_repositories(&mut conn, identities).await
    }

    async fn upsert_collection(
        &self,
        repo: &RepoIdentity,
        collection: &Collection,
        reconcile: bool,
    ) -> Result<UpsertSummary> {
        let collection = dedupe_projects(collection);
        // dropping the transaction before commit rolls it back
        let mut tx = self.pool.begin().await?;
        let summary = write_collection(&mut tx, repo, &collection, reconcile).await?;
        tx.commit().await?;

        debug!(
            repo = %repo,
            categories = summary.categories,
            projects = summary.projects,
            pending = summary.pending_embeddings.len(),
            "Committed collection"
        );
        Ok(summary)
    }

    async fn load_collection(&self, repo: &RepoIdentity) -> Result<Option<RepositoryCollection>> {
        let repo = repo.normalized()?;
        Ok(self.load_rows(std::slice::from_ref(&repo)).await?.into_iter().next())
    }

    async fn load_collections(
        &self,
        repos: &[RepoIdentity],
    ) -> Result<Vec<RepositoryCollection>> {
        let repos = repos
            .iter()
            .map(RepoIdentity::normalized)
            .collect::<Result<Vec<_>>>()?;
        self.load_rows(&repos).await
    }

    async fn load_stats(&self, repo: &RepoIdentity) -> Result<Option<ProjectStats>> {
        let repo = repo.normalized()?;
        let row: Option<StatsRow> = sqlx::query_as(
            r#"
SELECT s.stargazers_count, s.open_issue_count, s.updated_at
FROM project_stats s
JOIN repository r ON r.id = s.repository_id
WHERE r.hostname = $1 AND r.owner = $2 AND r.repo = $3
            "#,
        )
        .bind(&repo.hostname)
        .bind(&repo.owner)
        .bind(&repo.repo)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ProjectStats {
            repository: repo,
            stargazers_count: row.stargazers_count,
            open_issue_count: row.open_issue_count,
            updated_at: row.updated_at,
        }))
    }

    async fn upsert_stats(&self, repo: &RepoIdentity, stats: RepoStats) -> Result<ProjectStats> {
        let mut tx = self.pool.begin().await?;
        let repository = identity::upsert_repositories(&mut tx, std::slice::from_ref(repo)).await?;
        let repository = repository
            .into_iter()
            .next()
            .ok_or(crate::error::Error::Database(sqlx::Error::RowNotFound))?;

        let row: StatsRow = sqlx::query_as(
            r#"
INSERT INTO project_stats (repository_id, stargazers_count, open_issue_count)
VALUES ($1, $2, $3)
ON CONFLICT (repository_id) DO UPDATE SET
    stargazers_count = EXCLUDED.stargazers_count,
    open_issue_count = EXCLUDED.open_issue_count,
    updated_at = now()
RETURNING stargazers_count, open_issue_count, updated_at
            "#,
        )
        .bind(repository.id)
        .bind(stats.stargazers_count)
        .bind(stats.open_issue_count)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(ProjectStats {
            repository: repository.identity,
            stargazers_count: row.stargazers_count,
            open_issue_count: row.open_issue_count,
            updated_at: row.updated_at,
        })
    }

    async fn list_stale_embeddings(&self, ttl: Option<Duration>) -> Result<Vec<ProjectText>> {
        let ttl_secs: Option<f64> = ttl.map(|d| d.as_secs_f64());
        let rows: Vec<ProjectTextRow> = sqlx::query_as(
            r#"
SELECT p.id AS project_id, p.name, p.description, p.content_hash
FROM project p
LEFT JOIN project_embedding e ON e.project_id = p.id
WHERE e.id IS NULL
   OR e.content_hash <> p.content_hash
   OR ($1::float8 IS NOT NULL AND e.updated_at < now() - make_interval(secs => $1::float8))
ORDER BY p.id
            "#,
        )
        .bind(ttl_secs)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProjectText::from).collect())
    }

    async fn upsert_embeddings(&self, embeddings: &[ProjectEmbedding]) -> Result<()> {
        if embeddings.is_empty() {
            return Ok(());
        }
        // fixed row order so concurrent writers cannot deadlock
        let mut ordered: Vec<&ProjectEmbedding> = embeddings.iter().collect();
        ordered.sort_by_key(|e| e.project_id);

        let mut tx = self.pool.begin().await?;
        for embedding in ordered {
            let vector = pgvector::Vector::from(embedding.vector.clone());
            sqlx::query(
                r#"
INSERT INTO project_embedding (project_id, content_hash, vector)
VALUES ($1, $2, $3)
ON CONFLICT (project_id) DO UPDATE SET
    content_hash = EXCLUDED.content_hash,
    vector = EXCLUDED.vector,
    updated_at = now()
                "#,
            )
            .bind(embedding.project_id)
            .bind(&embedding.content_hash)
            .bind(&vector)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let statement = build_search_statement(
            &request.filters,
            request.embedding.as_deref(),
            request.limit,
        );
        debug!(args = statement.args.len(), "Running search statement");

        let mut query = sqlx::query_as::<_, SearchRow>(&statement.sql);
        for arg in &statement.args {
            query = match arg {
                SearchArg::Text(value) => query.bind(value.as_str()),
                SearchArg::Vector(values) => query.bind(pgvector::Vector::from(values.clone())),
                SearchArg::Limit(limit) => query.bind(*limit),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(SearchHit::from).collect())
    }
}
