//! PostgreSQL schema definition

/// SQL schema for the index database; `{dimension}` is substituted with the
/// configured embedding width.
const SCHEMA_TEMPLATE: &str = r#"
CREATE EXTENSION IF NOT EXISTS vector;

-- Repositories: natural key hostname/owner/repo, never deleted
CREATE TABLE IF NOT EXISTS repository (
    id BIGSERIAL PRIMARY KEY,
    hostname TEXT NOT NULL,
    owner TEXT NOT NULL,
    repo TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE(hostname, owner, repo)
);

-- Collections: one parsed document per repository
CREATE TABLE IF NOT EXISTS collection (
    id BIGSERIAL PRIMARY KEY,
    repository_id BIGINT NOT NULL UNIQUE REFERENCES repository(id),
    language TEXT NOT NULL DEFAULT '',
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Categories: section headings inside a collection
CREATE TABLE IF NOT EXISTS category (
    id BIGSERIAL PRIMARY KEY,
    collection_id BIGINT NOT NULL REFERENCES collection(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE(collection_id, name)
);

-- Projects: list entries linking to a repository
CREATE TABLE IF NOT EXISTS project (
    id BIGSERIAL PRIMARY KEY,
    category_id BIGINT NOT NULL REFERENCES category(id) ON DELETE CASCADE,
    repository_id BIGINT NOT NULL REFERENCES repository(id),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    content_hash TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE(category_id, repository_id)
);

-- Repository metadata cache
CREATE TABLE IF NOT EXISTS project_stats (
    id BIGSERIAL PRIMARY KEY,
    repository_id BIGINT NOT NULL UNIQUE REFERENCES repository(id),
    stargazers_count BIGINT NOT NULL DEFAULT 0,
    open_issue_count BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Project embeddings
CREATE TABLE IF NOT EXISTS project_embedding (
    id BIGSERIAL PRIMARY KEY,
    project_id BIGINT NOT NULL UNIQUE REFERENCES project(id) ON DELETE CASCADE,
    content_hash TEXT NOT NULL,
    vector vector({dimension}) NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_project_category ON project(category_id);
CREATE INDEX IF NOT EXISTS idx_project_repository ON project(repository_id);
CREATE INDEX IF NOT EXISTS idx_project_updated ON project(updated_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_embedding_updated ON project_embedding(updated_at);
CREATE INDEX IF NOT EXISTS idx_embedding_vector
    ON project_embedding USING hnsw (vector vector_cosine_ops);
"#;

/// Render the schema for a given embedding dimension
pub fn schema_sql(dimension: usize) -> String {
    SCHEMA_TEMPLATE.replace("{dimension}", &dimension.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_uses_dimension() {
        let sql = schema_sql(768);
        assert!(sql.contains("vector(768)"));
        assert!(!sql.contains("{dimension}"));
    }
}
