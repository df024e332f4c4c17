//! Default values for configuration

/// Default database URL (falls back to an in-process store when unset)
pub fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "memory://".to_string())
}

/// Default GitHub REST API base URL
pub fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Default environment variable holding the GitHub token
pub fn default_github_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

/// Default GitHub request budget (authenticated limit is 5000/hour)
pub fn default_github_requests_per_minute() -> u32 {
    80
}

/// Default GitHub burst size
pub fn default_github_burst() -> u32 {
    10
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("awesome-index/{}", env!("CARGO_PKG_VERSION"))
}

/// Default upstream request timeout in seconds
pub fn default_request_timeout() -> u64 {
    30
}

/// Default embedding backend URL
pub fn default_embedding_url() -> String {
    std::env::var("AWESOME_INDEX_EMBEDDING_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

/// Default embedding dimension (bge-small)
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default environment variable holding the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "AWESOME_INDEX_EMBEDDING_API_KEY".to_string()
}

/// Default embedding request budget
pub fn default_embedding_requests_per_minute() -> u32 {
    600
}

/// Default embedding burst size
pub fn default_embedding_burst() -> u32 {
    20
}

/// Default collection TTL (one day)
pub fn default_collection_ttl_secs() -> i64 {
    24 * 60 * 60
}

/// Default stats TTL (six hours)
pub fn default_stats_ttl_secs() -> i64 {
    6 * 60 * 60
}

/// Default embedding TTL (thirty days)
pub fn default_embedding_ttl_secs() -> i64 {
    30 * 24 * 60 * 60
}

/// Default number of repositories fetched concurrently
pub fn default_fetch_concurrency() -> usize {
    8
}

/// Default search result limit
pub fn default_search_limit() -> i64 {
    50
}

/// Default maximum search result limit
pub fn default_search_max_limit() -> i64 {
    200
}

/// Default: level-3 headings fold into their level-2 category
pub fn default_sub_headings_as_categories() -> bool {
    false
}

/// Default RPC request deadline in seconds
pub fn default_rpc_request_timeout() -> u64 {
    120
}
