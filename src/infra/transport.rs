//! Outbound HTTP over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;

use crate::infra::error::InfraError;
use crate::network::{NetworkError, OutboundRequest, ResponseSnapshot, Transport};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

impl ReqwestTransport {
    /// Every request, body included, fails with [`NetworkError::Timeout`]
    /// once `request_timeout` has passed.
    pub fn new(request_timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(request_timeout)
            .connect_timeout(request_timeout.min(CONNECT_TIMEOUT))
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;
        Ok(Self { client })
    }

    pub fn user_agent() -> &'static str {
        concat!("vellum/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ResponseSnapshot, NetworkError> {
        let mut builder = self.client.request(request.method, request.url);
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                NetworkError::Timeout
            } else {
                NetworkError::unreachable(err)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                NetworkError::Timeout
            } else {
                NetworkError::unreachable(err)
            }
        })?;

        Ok(ResponseSnapshot {
            status,
            headers,
            body,
        })
    }
}
