//! Upstream repository client
//!
//! Fetches list documents and repository metadata from the GitHub REST API.

use crate::config::GitHubConfig;
use crate::error::{Error, Result};
use crate::models::{RepoIdentity, RepoStats, DEFAULT_HOSTNAME};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Remote source of list documents and repository metadata
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Raw README bytes of a repository
    async fn get_readme(&self, repo: &RepoIdentity) -> Result<Vec<u8>>;

    /// Star and open-issue counts of a repository
    async fn get_stats(&self, repo: &RepoIdentity) -> Result<RepoStats>;
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    stargazers_count: i64,
    open_issues_count: i64,
}

pub struct GitHubClient {
    client: Client,
    api_url: Url,
    limiter: RateLimiter,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, limiter: RateLimiter) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| Error::Config(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = config.token() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Config(format!("Invalid GitHub token: {}", e)))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut api_url = Url::parse(&config.api_url)?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        Ok(Self {
            client,
            api_url,
            limiter,
        })
    }

    fn repo_url(&self, repo: &RepoIdentity, suffix: &str) -> Result<Url> {
        if repo.hostname != DEFAULT_HOSTNAME {
            return Err(Error::InvalidRepository(format!(
                "unsupported host '{}' for {}",
                repo.hostname, repo
            )));
        }
        let path = format!("repos/{}/{}{}", repo.owner, repo.repo, suffix);
        Ok(self.api_url.join(&path)?)
    }

    async fn send(&self, repo: &RepoIdentity, request: reqwest::RequestBuilder) -> Result<Response> {
        self.limiter.acquire().await;
        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("{}: {}", repo, e)))?;
        check_status(repo, response)
    }
}

/// Map GitHub status codes onto the error taxonomy
fn check_status(repo: &RepoIdentity, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    match status {
        StatusCode::NOT_FOUND => Err(Error::NotFound(repo.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited(repo.to_string())),
        StatusCode::FORBIDDEN if exhausted => Err(Error::RateLimited(repo.to_string())),
        _ => Err(Error::Upstream(format!("{}: HTTP {}", repo, status))),
    }
}

#[async_trait]
impl Upstream for GitHubClient {
    async fn get_readme(&self, repo: &RepoIdentity) -> Result<Vec<u8>> {
        let url = self.repo_url(repo, "/readme")?;
        debug!(repo = %repo, "Fetching README");
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github.raw+json");
        let response = self.send(repo, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("{}: {}", repo, e)))?;
        Ok(bytes.to_vec())
    }

    async fn get_stats(&self, repo: &RepoIdentity) -> Result<RepoStats> {
        let url = self.repo_url(repo, "")?;
        debug!(repo = %repo, "Fetching repository stats");
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        let response = self.send(repo, request).await?;
        let body: RepositoryResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("{}: {}", repo, e)))?;
        Ok(RepoStats {
            stargazers_count: body.stargazers_count,
            open_issue_count: body.open_issues_count,
        })
    }
}

/// Create the upstream client with its own rate limiter
pub fn create_upstream(config: &GitHubConfig) -> Result<Arc<dyn Upstream>> {
    let limiter = RateLimiter::per_minute("github", config.requests_per_minute, config.burst);
    Ok(Arc::new(GitHubClient::new(config, limiter)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GitHubClient {
        let config = GitHubConfig {
            api_url: server.uri(),
            token_env: "AWESOME_INDEX_TEST_UNSET_TOKEN".to_string(),
            ..Default::default()
        };
        GitHubClient::new(&config, RateLimiter::unlimited()).unwrap()
    }

    fn repo() -> RepoIdentity {
        RepoIdentity::new("github.com", "avelino", "awesome-go").unwrap()
    }

    #[tokio::test]
    async fn test_get_readme_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/avelino/awesome-go/readme"))
            .and(header("accept", "application/vnd.github.raw+json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Awesome Go\n"))
            .expect(1)
            .mount(&server)
            .await;

        let bytes = client(&server).get_readme(&repo()).await.unwrap();
        assert_eq!(bytes, b"# Awesome Go\n");
    }

    #[tokio::test]
    async fn test_get_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/avelino/awesome-go"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "full_name": "avelino/awesome-go",
                "stargazers_count": 120000,
                "open_issues_count": 42
            })))
            .mount(&server)
            .await;

        let stats = client(&server).get_stats(&repo()).await.unwrap();
        assert_eq!(
            stats,
            RepoStats {
                stargazers_count: 120000,
                open_issue_count: 42
            }
        );
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/a/missing/readme"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/repos/a/throttled/readme"))
            .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
            .mount(&server)
            .await;
        Mock::given(path("/repos/a/busy/readme"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(path("/repos/a/forbidden/readme"))
            .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "12"))
            .mount(&server)
            .await;

        let client = client(&server);
        let id = |name: &str| RepoIdentity::new("github.com", "a", name).unwrap();

        assert!(client.get_readme(&id("missing")).await.unwrap_err().is_not_found());
        assert!(matches!(
            client.get_readme(&id("throttled")).await.unwrap_err(),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            client.get_readme(&id("busy")).await.unwrap_err(),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            client.get_readme(&id("forbidden")).await.unwrap_err(),
            Error::Upstream(_)
        ));
    }

    #[tokio::test]
    async fn test_rejects_foreign_host() {
        let server = MockServer::start().await;
        let gitlab = RepoIdentity::new("gitlab.com", "a", "b").unwrap();
        let err = client(&server).get_readme(&gitlab).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRepository(_)));
    }
}
