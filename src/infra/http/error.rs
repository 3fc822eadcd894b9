use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ContentError, ErrorReport};
use crate::application::repos::SourceError;
use crate::network::{ControlError, PartitionError};

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const TIMEOUT: &str = "timeout";
    pub const REMOTE: &str = "remote_error";
    pub const NETWORK_CACHE: &str = "network_cache_error";
    pub const UNAVAILABLE: &str = "unavailable";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "admin token required",
            None,
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "admin token rejected",
            None,
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        let hint = Some(err.to_string());
        match err {
            ContentError::NotFound { .. } | ContentError::Remote(SourceError::NotFound) => {
                Self::new(
                    StatusCode::NOT_FOUND,
                    codes::NOT_FOUND,
                    "content item not found",
                    hint,
                )
            }
            ContentError::Invalid(_) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "invalid content item",
                hint,
            ),
            ContentError::Timeout { .. } => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                codes::TIMEOUT,
                "remote store did not answer in time",
                hint,
            ),
            ContentError::Remote(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::REMOTE,
                "remote store request failed",
                hint,
            ),
        }
    }
}

impl From<PartitionError> for ApiError {
    fn from(err: PartitionError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::NETWORK_CACHE,
            "network cache operation failed",
            Some(err.to_string()),
        )
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Closed => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::UNAVAILABLE,
                "network cache worker is not running",
                None,
            ),
            ControlError::Clear(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", self.status, detail).attach(&mut response);
        response
    }
}
