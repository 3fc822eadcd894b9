//! Public content reads and admin mutations.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::entities::{ContentItem, ContentPatch, NewContentItem};

use super::HttpState;
use super::error::ApiError;
use super::middleware::AdminAccess;

const MAX_FEATURED: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct FeaturedQuery {
    pub count: Option<usize>,
}

pub async fn featured(
    State(state): State<HttpState>,
    Query(query): Query<FeaturedQuery>,
) -> Json<Vec<ContentItem>> {
    let count = query
        .count
        .unwrap_or(state.content.config().featured_count)
        .min(MAX_FEATURED);
    Json(state.content.featured(count).await)
}

pub async fn list_items(State(state): State<HttpState>) -> Json<Vec<ContentItem>> {
    Json(state.content.all().await)
}

pub async fn category_items(
    State(state): State<HttpState>,
    Path(category_id): Path<String>,
) -> Json<Vec<ContentItem>> {
    Json(state.content.by_category(&category_id).await)
}

pub async fn get_item(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, ApiError> {
    Ok(Json(state.content.by_id(id).await?))
}

pub async fn create_item(
    _admin: AdminAccess,
    State(state): State<HttpState>,
    Json(payload): Json<NewContentItem>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.content.create(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_item(
    _admin: AdminAccess,
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ContentPatch>,
) -> Result<Json<ContentItem>, ApiError> {
    Ok(Json(state.content.update(id, patch).await?))
}

pub async fn delete_item(
    _admin: AdminAccess,
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.content.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
