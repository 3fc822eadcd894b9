//! HTTP surface.

mod content;
pub mod error;
mod middleware;
mod network;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use serde_json::{Value, json};

use crate::application::content::ContentService;
use crate::network::{CacheRegistry, ControlHandle};

pub use error::ApiError;

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentService>,
    pub registry: Arc<CacheRegistry>,
    pub control: ControlHandle,
    /// Bearer token for mutation and maintenance routes; `None` leaves them open.
    pub admin_token: Option<Arc<str>>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/featured", get(content::featured))
        .route(
            "/api/items",
            get(content::list_items).post(content::create_item),
        )
        .route(
            "/api/items/{id}",
            get(content::get_item)
                .patch(content::update_item)
                .delete(content::delete_item),
        )
        .route("/api/categories/{id}/items", get(content::category_items))
        .route("/api/cache/stats", get(network::stats))
        .route("/admin/network/activate", post(network::activate))
        .route("/admin/network/populate", post(network::populate))
        .route("/admin/network/clear", post(network::clear))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
        .with_state(state)
}

async fn health(State(state): State<HttpState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "fallback_version": state.content.stats().fallback_version,
        "network_version": state.registry.version(),
    }))
}
