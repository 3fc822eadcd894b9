use std::error::Error as StdError;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::Response;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    application::repos::SourceError, domain::error::DomainError, infra::error::InfraError,
};

/// Failures visible to callers of the content service.
///
/// Read operations only ever surface `NotFound`; timeouts and remote failures
/// on reads are absorbed by the fallback path. Mutations surface all of them.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{operation} did not complete within {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error(transparent)]
    Remote(#[from] SourceError),
    #[error("content item `{id}` not found")]
    NotFound { id: Uuid },
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

impl ContentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

/// Diagnostic attached to an error response for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}
