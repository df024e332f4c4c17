//! In-process fakes for the external collaborators

use crate::config::Config;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::github::Upstream;
use crate::models::{RepoIdentity, RepoStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone)]
enum Canned<T> {
    Ok(T),
    NotFound,
    Fail,
}

/// Upstream serving canned documents and counting calls
#[derive(Default)]
pub struct FakeUpstream {
    readmes: Mutex<HashMap<RepoIdentity, Canned<Vec<u8>>>>,
    stats: Mutex<HashMap<RepoIdentity, Canned<RepoStats>>>,
    readme_calls: AtomicUsize,
    stats_calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_readme(&self, repo: &RepoIdentity, markdown: &str) {
        self.readmes
            .lock()
            .unwrap()
            .insert(repo.clone(), Canned::Ok(markdown.as_bytes().to_vec()));
    }

    pub fn set_readme_bytes(&self, repo: &RepoIdentity, bytes: Vec<u8>) {
        self.readmes
            .lock()
            .unwrap()
            .insert(repo.clone(), Canned::Ok(bytes));
    }

    pub fn set_readme_failure(&self, repo: &RepoIdentity) {
        self.readmes.lock().unwrap().insert(repo.clone(), Canned::Fail);
    }

    pub fn set_readme_missing(&self, repo: &RepoIdentity) {
        self.readmes
            .lock()
            .unwrap()
            .insert(repo.clone(), Canned::NotFound);
    }

    pub fn set_stats(&self, repo: &RepoIdentity, stargazers_count: i64, open_issue_count: i64) {
        self.stats.lock().unwrap().insert(
            repo.clone(),
            Canned::Ok(RepoStats {
                stargazers_count,
                open_issue_count,
            }),
        );
    }

    pub fn set_stats_failure(&self, repo: &RepoIdentity) {
        self.stats.lock().unwrap().insert(repo.clone(), Canned::Fail);
    }

    pub fn readme_calls(&self) -> usize {
        self.readme_calls.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }
}

fn answer<T: Clone>(repo: &RepoIdentity, canned: Option<Canned<T>>) -> Result<T> {
    match canned {
        Some(Canned::Ok(value)) => Ok(value),
        Some(Canned::Fail) => Err(Error::Upstream(format!("{}: HTTP 502", repo))),
        Some(Canned::NotFound) | None => Err(Error::NotFound(repo.to_string())),
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn get_readme(&self, repo: &RepoIdentity) -> Result<Vec<u8>> {
        self.readme_calls.fetch_add(1, Ordering::SeqCst);
        let canned = self.readmes.lock().unwrap().get(repo).cloned();
        answer(repo, canned)
    }

    async fn get_stats(&self, repo: &RepoIdentity) -> Result<RepoStats> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let canned = self.stats.lock().unwrap().get(repo).cloned();
        answer(repo, canned)
    }
}

/// Embedder producing hash-derived unit vectors
pub struct FakeEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    fail_all: AtomicBool,
    poison: Mutex<Option<String>>,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            poison: Mutex::new(None),
        }
    }

    /// Deterministic vector for `text`; identical texts have distance zero
    pub fn vector_for(text: &str, dimension: usize) -> Vec<f32> {
        let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
        let mut bytes = vec![0u8; dimension];
        reader.fill(&mut bytes);
        let raw: Vec<f32> = bytes.iter().map(|b| *b as f32 + 1.0).collect();
        let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
        raw.iter().map(|v| v / norm).collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fail any request containing a text with this substring
    pub fn poison(&self, needle: &str) {
        *self.poison.lock().unwrap() = Some(needle.to_string());
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::Embedding("backend unavailable".to_string()));
        }
        if let Some(needle) = self.poison.lock().unwrap().as_deref() {
            if texts.iter().any(|t| t.contains(needle)) {
                return Err(Error::Embedding(format!("cannot embed '{}'", needle)));
            }
        }
        Ok(texts
            .iter()
            .map(|t| Self::vector_for(t, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

pub fn repo(owner: &str, name: &str) -> RepoIdentity {
    RepoIdentity::new("github.com", owner, name).unwrap()
}

/// Default config sized for a `FakeEmbedder` of `dimension`
pub fn config_with_dimension(dimension: usize) -> Config {
    let mut config = Config::default();
    config.embedding.dimension = dimension;
    config
}
