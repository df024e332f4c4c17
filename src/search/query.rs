//! Parameterized SQL for project search
//!
//! Only clause repetition and placeholder numbering vary with the input;
//! every value travels as a bound argument.

use crate::models::RepoIdentity;

/// A value to bind, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub enum SearchArg {
    Text(String),
    Vector(Vec<f32>),
    Limit(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchStatement {
    pub sql: String,
    pub args: Vec<SearchArg>,
}

impl SearchStatement {
    fn push(&mut self, arg: SearchArg) -> usize {
        self.args.push(arg);
        self.args.len()
    }
}

const SELECT_COLUMNS: &str = "\
SELECT p.id AS project_id, p.name, p.description, \
pr.hostname AS project_hostname, pr.owner AS project_owner, pr.repo AS project_repo, \
c.name AS category, \
r.hostname AS collection_hostname, r.owner AS collection_owner, r.repo AS collection_repo, \
p.updated_at";

const FROM_CLAUSE: &str = "\
FROM project p \
JOIN category c ON c.id = p.category_id \
JOIN collection col ON col.id = c.collection_id \
JOIN repository r ON r.id = col.repository_id \
JOIN repository pr ON pr.id = p.repository_id";

/// Build the search statement.
///
/// `filters` restrict results to collections read from those repositories
/// (empty means no restriction). With an `embedding`, results are ordered by
/// cosine distance to it; without one, most recently updated first.
pub fn build_search_statement(
    filters: &[RepoIdentity],
    embedding: Option<&[f32]>,
    limit: i64,
) -> SearchStatement {
    let mut statement = SearchStatement {
        sql: String::new(),
        args: Vec::with_capacity(filters.len() * 3 + 2),
    };

    let mut predicates = Vec::with_capacity(filters.len());
    for filter in filters {
        let host = statement.push(SearchArg::Text(filter.hostname.clone()));
        let owner = statement.push(SearchArg::Text(filter.owner.clone()));
        let repo = statement.push(SearchArg::Text(filter.repo.clone()));
        predicates.push(format!(
            "(r.hostname = ${} AND r.owner = ${} AND r.repo = ${})",
            host, owner, repo
        ));
    }

    let vector_slot = embedding.map(|v| statement.push(SearchArg::Vector(v.to_vec())));

    let mut sql = String::from(SELECT_COLUMNS);
    match vector_slot {
        Some(slot) => sql.push_str(&format!(", (e.vector <=> ${})::float8 AS distance ", slot)),
        None => sql.push_str(", NULL::float8 AS distance "),
    }
    sql.push_str(FROM_CLAUSE);
    if vector_slot.is_some() {
        sql.push_str(" JOIN project_embedding e ON e.project_id = p.id");
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" OR "));
    }

    match vector_slot {
        Some(slot) => sql.push_str(&format!(" ORDER BY e.vector <=> ${} ASC, p.id ASC", slot)),
        None => sql.push_str(" ORDER BY p.updated_at DESC, p.id DESC"),
    }

    let limit_slot = statement.push(SearchArg::Limit(limit));
    sql.push_str(&format!(" LIMIT ${}", limit_slot));

    statement.sql = sql;
    statement
}

/// Clamp a requested limit: non-positive means `default`, never above `max`
pub fn effective_limit(requested: i64, default: i64, max: i64) -> i64 {
    let limit = if requested <= 0 { default } else { requested };
    limit.min(max).max(1)
}
