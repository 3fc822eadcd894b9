//! Content source backed by a PostgREST-style HTTP API.
//!
//! Rows live in one table under `{base_url}/rest/v1/{table}`. Filters use the
//! `column=eq.value` form and writes ask for the affected rows back with
//! `Prefer: return=representation`.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::application::repos::{ContentQuery, ContentSource, SourceError};
use crate::domain::entities::{ContentItem, ContentPatch, NewContentItem};
use crate::infra::error::InfraError;
use crate::network::{OutboundRequest, ResponseSnapshot, Transport};

const METRIC_REMOTE_MS: &str = "vellum_remote_request_ms";
const JSON: &str = "application/json";
const ERROR_BODY_LIMIT: usize = 256;

pub struct RestContentSource {
    transport: Arc<dyn Transport>,
    endpoint: Url,
    api_key: Option<String>,
}

impl RestContentSource {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &Url,
        table: &str,
        api_key: Option<String>,
    ) -> Result<Self, InfraError> {
        let mut endpoint = base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| {
                InfraError::configuration(format!("remote.base_url `{base_url}` cannot be a base"))
            })?
            .pop_if_empty()
            .extend(["rest", "v1", table]);
        endpoint.set_query(None);

        Ok(Self {
            transport,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn select_url(&self, query: &ContentQuery) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if let Some(id) = query.id {
                pairs.append_pair("id", &format!("eq.{id}"));
            }
            if let Some(category) = query.category_id.as_deref() {
                pairs.append_pair("category_id", &format!("eq.{category}"));
            }
            if let Some(trending) = query.trending {
                pairs.append_pair("trending", &format!("eq.{trending}"));
            }
            pairs.append_pair("order", "created_at.desc");
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        url
    }

    fn row_url(&self, id: Uuid) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        url
    }

    fn request(&self, method: Method, url: Url) -> OutboundRequest {
        let request = OutboundRequest::new(method, url).with_accept(JSON);
        match self.api_key.as_deref() {
            Some(key) => request
                .with_header("apikey", key)
                .with_header("authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    fn write_request(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> OutboundRequest {
        let request = self
            .request(method, url)
            .with_header("prefer", "return=representation");
        match body {
            Some(body) => request.with_header("content-type", JSON).with_body(body),
            None => request,
        }
    }

    async fn call(&self, request: OutboundRequest) -> Result<ResponseSnapshot, SourceError> {
        let started = Instant::now();
        let method = request.method.clone();
        let result = self.transport.send(request).await;
        histogram!(METRIC_REMOTE_MS, "method" => method.to_string())
            .record(started.elapsed().as_secs_f64() * 1_000.0);

        let response = result.map_err(SourceError::transport)?;
        if !response.is_success() {
            let mut message = String::from_utf8_lossy(&response.body).into_owned();
            if message.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(SourceError::Status {
                status: response.status,
                message,
            });
        }
        Ok(response)
    }

    async fn rows(&self, request: OutboundRequest) -> Result<Vec<ContentItem>, SourceError> {
        let response = self.call(request).await?;
        decode(&response)
    }
}

fn decode<T: DeserializeOwned>(response: &ResponseSnapshot) -> Result<T, SourceError> {
    serde_json::from_slice(&response.body).map_err(SourceError::decode)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, SourceError> {
    serde_json::to_vec(value).map_err(SourceError::decode)
}

#[async_trait]
impl ContentSource for RestContentSource {
    #[instrument(skip(self), fields(table = %self.endpoint.path()))]
    async fn select(&self, query: &ContentQuery) -> Result<Vec<ContentItem>, SourceError> {
        let url = self.select_url(query);
        let items = self.rows(self.request(Method::GET, url)).await?;
        debug!(rows = items.len(), "remote select");
        Ok(items)
    }

    async fn insert(&self, item: &NewContentItem) -> Result<ContentItem, SourceError> {
        let request =
            self.write_request(Method::POST, self.endpoint.clone(), Some(encode(item)?));
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::decode("insert returned no row"))
    }

    async fn update(&self, id: Uuid, patch: &ContentPatch) -> Result<ContentItem, SourceError> {
        let request = self.write_request(Method::PATCH, self.row_url(id), Some(encode(patch)?));
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or(SourceError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), SourceError> {
        let request = self.write_request(Method::DELETE, self.row_url(id), None);
        if self.rows(request).await?.is_empty() {
            return Err(SourceError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::network::NetworkError;

    use super::*;

    struct Recording {
        requests: Mutex<Vec<OutboundRequest>>,
        reply: ResponseSnapshot,
    }

    impl Recording {
        fn replying(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                reply: ResponseSnapshot::new(status, body.to_string()),
            })
        }

        fn last(&self) -> OutboundRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for Recording {
        async fn send(&self, request: OutboundRequest) -> Result<ResponseSnapshot, NetworkError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    const ROW: &str = r#"[{"id":"6a0f1d2e-3b1c-4c55-9e10-5d7c1a000001","title":"Packing light","category_id":"guides","trending":true,"created_at":"2026-09-01T08:00:00Z"}]"#;

    fn source(transport: Arc<Recording>) -> RestContentSource {
        let base = Url::parse("https://db.example.com/").unwrap();
        RestContentSource::new(transport, &base, "items", Some("k3y".to_string())).unwrap()
    }

    #[tokio::test]
    async fn select_builds_filtered_query() {
        let transport = Recording::replying(200, ROW);
        let rest = source(transport.clone());

        let items = rest
            .select(&ContentQuery::recent(3).trending().in_category("guides"))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].trending);

        let request = transport.last();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url.path(), "/rest/v1/items");
        assert_eq!(
            request.url.query(),
            Some("select=*&category_id=eq.guides&trending=eq.true&order=created_at.desc&limit=3")
        );
        assert!(
            request
                .headers
                .iter()
                .any(|(name, value)| name == "apikey" && value == "k3y")
        );
    }

    #[tokio::test]
    async fn error_status_becomes_source_error() {
        let rest = source(Recording::replying(503, "upstream down"));
        let err = rest.select(&ContentQuery::recent(1)).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let rest = source(Recording::replying(200, "[]"));
        let patch = ContentPatch {
            trending: Some(false),
            ..Default::default()
        };
        let err = rest.update(Uuid::new_v4(), &patch).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound));
    }

    #[tokio::test]
    async fn insert_posts_json_and_reads_representation() {
        let transport = Recording::replying(201, ROW);
        let rest = source(transport.clone());
        let created = rest
            .insert(&NewContentItem {
                title: "Packing light".to_string(),
                summary: String::new(),
                category_id: Some("guides".to_string()),
                trending: true,
                image_url: None,
            })
            .await
            .unwrap();
        assert_eq!(created.title, "Packing light");

        let request = transport.last();
        assert_eq!(request.method, Method::POST);
        let body: serde_json::Value =
            serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["category_id"], "guides");
    }

    #[test]
    fn base_path_is_preserved() {
        let base = Url::parse("https://example.com/db").unwrap();
        let rest =
            RestContentSource::new(Recording::replying(200, "[]"), &base, "posts", None).unwrap();
        assert_eq!(rest.endpoint().as_str(), "https://example.com/db/rest/v1/posts");
    }
}
