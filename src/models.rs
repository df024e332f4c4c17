//! Domain types shared by the parser, stores, coordinator and RPC layer.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Host assumed when an identity is given as a bare `owner/repo`
pub const DEFAULT_HOSTNAME: &str = "github.com";

/// Natural key of a repository: `hostname/owner/repo`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub hostname: String,
    pub owner: String,
    pub repo: String,
}

impl RepoIdentity {
    /// Build a normalized identity, rejecting empty or path-like components
    pub fn new(hostname: &str, owner: &str, repo: &str) -> Result<Self> {
        let hostname = hostname.trim().to_lowercase();
        let owner = owner.trim().to_lowercase();
        let mut repo = repo.trim().to_lowercase();
        if let Some(stripped) = repo.strip_suffix(".git") {
            repo = stripped.to_string();
        }

        for (field, value) in [("hostname", &hostname), ("owner", &owner), ("repo", &repo)] {
            if value.is_empty() {
                return Err(Error::InvalidRepository(format!("empty {}", field)));
            }
            if value.contains('/') || value.chars().any(char::is_whitespace) {
                return Err(Error::InvalidRepository(format!(
                    "invalid {} '{}'",
                    field, value
                )));
            }
        }

        Ok(Self {
            hostname,
            owner,
            repo,
        })
    }

    /// Re-apply normalization to an identity that may have been deserialized raw
    pub fn normalized(&self) -> Result<Self> {
        Self::new(&self.hostname, &self.owner, &self.repo)
    }

    /// Parse a link target as a repository, returning `None` for anything that
    /// is not `scheme://host/owner/repo[/...]`.
    pub fn from_url(link: &str) -> Option<Self> {
        let url = Url::parse(link.trim()).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }
        let host = url.host_str()?;
        let host = host.strip_prefix("www.").unwrap_or(host);
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?;
        Self::new(host, owner, repo).ok()
    }

    /// Canonical `https://` URL of the repository
    pub fn url(&self) -> String {
        format!("https://{}/{}/{}", self.hostname, self.owner, self.repo)
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.owner, self.repo)
    }
}

impl FromStr for RepoIdentity {
    type Err = Error;

    /// Accepts `https://host/owner/repo`, `host/owner/repo` and `owner/repo`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.contains("://") {
            return Self::from_url(s)
                .ok_or_else(|| Error::InvalidRepository(format!("unrecognized URL '{}'", s)));
        }

        let parts: Vec<&str> = s.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            [owner, repo] => Self::new(DEFAULT_HOSTNAME, owner, repo),
            [host, owner, repo] => Self::new(host, owner, repo),
            _ => Err(Error::InvalidRepository(format!(
                "expected [host/]owner/repo, got '{}'",
                s
            ))),
        }
    }
}

/// A repository row with its surrogate key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    #[serde(flatten)]
    pub identity: RepoIdentity,
}

/// A listed project: one linked repository inside a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub repo: RepoIdentity,
}

impl Project {
    /// Text submitted to the embedding generator
    pub fn embedding_text(&self) -> String {
        embedding_text(&self.name, &self.description)
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.name, &self.description)
    }
}

/// A named group of projects inside a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub projects: Vec<Project>,
}

/// Everything parsed out of one awesome-list document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub language: String,
    pub categories: Vec<Category>,
}

impl Collection {
    pub fn project_count(&self) -> usize {
        self.categories.iter().map(|c| c.projects.len()).sum()
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Category name with its size, for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub project_count: usize,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            project_count: category.projects.len(),
        }
    }
}

/// A collection bound to the repository it was read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryCollection {
    pub repository: RepoIdentity,
    #[serde(flatten)]
    pub collection: Collection,
    pub updated_at: DateTime<Utc>,
}

/// Repository metadata as reported by the upstream client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStats {
    pub stargazers_count: i64,
    pub open_issue_count: i64,
}

/// Stored repository metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub repository: RepoIdentity,
    pub stargazers_count: i64,
    pub open_issue_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Project text awaiting an embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectText {
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub content_hash: String,
}

impl ProjectText {
    pub fn embedding_text(&self) -> String {
        embedding_text(&self.name, &self.description)
    }
}

/// A computed vector ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectEmbedding {
    pub project_id: i64,
    pub content_hash: String,
    pub vector: Vec<f32>,
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub repository: RepoIdentity,
    pub category: String,
    pub collection_repository: RepoIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

pub fn embedding_text(name: &str, description: &str) -> String {
    if description.is_empty() {
        name.to_string()
    } else {
        format!("{}: {}", name, description)
    }
}

/// blake3 digest used to detect project text changes
pub fn content_hash(name: &str, description: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\n");
    hasher.update(description.as_bytes());
    hasher.finalize().to_hex().to_string()
}
