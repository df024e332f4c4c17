//! RPC method implementations

use super::types::{
    identities, ListCollectionsParams, ListProjectsParams, RepositoryParams, RpcError,
    SearchProjectsParams,
};
use crate::fetch::FetchCoordinator;
use crate::search::SearchEngine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(e.to_string()))
}

/// Run one method call
pub async fn dispatch(
    coordinator: &FetchCoordinator,
    search: &SearchEngine,
    method: &str,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    debug!(method, "Dispatching");
    match method {
        "ListCollections" => {
            let params: ListCollectionsParams = parse_params(params)?;
            let repos = identities(&params.repositories)?;
            let collections = coordinator.list_collections(&repos).await;
            Ok(json!({ "collections": to_value(collections)? }))
        }
        "GetCollection" => {
            let params: RepositoryParams = parse_params(params)?;
            let repo = params.repository.identity()?;
            let collection = coordinator.get_collection(&repo).await?;
            Ok(json!({ "collection": to_value(collection)? }))
        }
        "ListCategories" => {
            let params: RepositoryParams = parse_params(params)?;
            let repo = params.repository.identity()?;
            let categories = coordinator.list_categories(&repo).await?;
            Ok(json!({ "categories": to_value(categories)? }))
        }
        "ListProjects" => {
            let params: ListProjectsParams = parse_params(params)?;
            let repo = params.repository.identity()?;
            let projects = coordinator.list_projects(&repo, &params.category).await?;
            Ok(json!({ "projects": to_value(projects)? }))
        }
        "SearchProjects" => {
            let params: SearchProjectsParams = parse_params(params)?;
            let repos = identities(&params.repositories)?;
            let hits = search
                .search(&params.query, &repos, params.limit.unwrap_or(0))
                .await?;
            Ok(json!({ "projects": to_value(hits)? }))
        }
        "GetProjectStats" => {
            let params: RepositoryParams = parse_params(params)?;
            let repo = params.repository.identity()?;
            let stats = coordinator.get_project_stats(&repo).await?;
            Ok(json!({ "stats": to_value(stats)? }))
        }
        other => Err(RpcError::method_not_found(other)),
    }
}
