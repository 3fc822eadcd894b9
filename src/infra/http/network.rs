//! Cache statistics and network cache maintenance.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::application::content::ContentStats;
use crate::network::RegistryStats;

use super::HttpState;
use super::error::ApiError;
use super::middleware::AdminAccess;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub content: ContentStats,
    pub network: RegistryStats,
}

#[derive(Debug, Deserialize)]
pub struct PopulateRequest {
    pub urls: Vec<String>,
}

pub async fn stats(State(state): State<HttpState>) -> Result<Json<CacheStatsResponse>, ApiError> {
    Ok(Json(CacheStatsResponse {
        content: state.content.stats(),
        network: state.registry.stats().await?,
    }))
}

pub async fn activate(
    _admin: AdminAccess,
    State(state): State<HttpState>,
) -> Result<StatusCode, ApiError> {
    state.control.activate_now().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn populate(
    _admin: AdminAccess,
    State(state): State<HttpState>,
    Json(request): Json<PopulateRequest>,
) -> Result<StatusCode, ApiError> {
    if request.urls.is_empty() {
        return Err(ApiError::bad_request("urls must not be empty", None));
    }
    state.control.populate(request.urls).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn clear(
    _admin: AdminAccess,
    State(state): State<HttpState>,
) -> Result<StatusCode, ApiError> {
    state.control.clear_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
