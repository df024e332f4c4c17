//! Repository identity resolution

use crate::error::{Error, Result};
use crate::models::{RepoIdentity, Repository};
use sqlx::PgConnection;
use std::collections::HashMap;

#[derive(sqlx::FromRow)]
struct RepositoryRow {
    id: i64,
    hostname: String,
    owner: String,
    repo: String,
}

/// Resolve-or-insert every identity in a single round-trip.
///
/// Returns one [`Repository`] per input, in input order; duplicate inputs
/// map to the same row. Works on any connection, so callers holding a
/// transaction get the rows inside it.
///
/// Rows are written in sorted identity order so concurrent transactions
/// lock overlapping repositories in the same sequence.
pub async fn upsert_repositories(
    conn: &mut PgConnection,
    identities: &[RepoIdentity],
) -> Result<Vec<Repository>> {
    if identities.is_empty() {
        return Ok(Vec::new());
    }

    let normalized = identities
        .iter()
        .map(RepoIdentity::normalized)
        .collect::<Result<Vec<_>>>()?;

    let mut unique: Vec<&RepoIdentity> = normalized.iter().collect();
    unique.sort();
    unique.dedup();

    let hostnames: Vec<&str> = unique.iter().map(|i| i.hostname.as_str()).collect();
    let owners: Vec<&str> = unique.iter().map(|i| i.owner.as_str()).collect();
    let repos: Vec<&str> = unique.iter().map(|i| i.repo.as_str()).collect();

    let rows: Vec<RepositoryRow> = sqlx::query_as(
        r#"
INSERT INTO repository (hostname, owner, repo)
SELECT hostname, owner, repo
FROM unnest($1::text[], $2::text[], $3::text[]) WITH ORDINALITY AS t(hostname, owner, repo, ord)
ORDER BY ord
ON CONFLICT (hostname, owner, repo) DO UPDATE SET updated_at = now()
RETURNING id, hostname, owner, repo
        "#,
    )
    .bind(&hostnames)
    .bind(&owners)
    .bind(&repos)
    .fetch_all(&mut *conn)
    .await?;

    let by_identity: HashMap<RepoIdentity, i64> = rows
        .into_iter()
        .map(|row| {
            (
                RepoIdentity {
                    hostname: row.hostname,
                    owner: row.owner,
                    repo: row.repo,
                },
                row.id,
            )
        })
        .collect();

    normalized
        .into_iter()
        .map(|identity| {
            let id = by_identity
                .get(&identity)
                .copied()
                .ok_or(Error::Database(sqlx::Error::RowNotFound))?;
            Ok(Repository { id, identity })
        })
        .collect()
}
