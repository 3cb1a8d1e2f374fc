use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::history::HistoryRecord;

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a not found error response
    pub fn not_found(resource: &str) -> Self {
        Self {
            error: "not_found".to_string(),
            message: format!("The requested {} could not be found", resource),
            details: None,
        }
    }

    /// Create a validation error response
    pub fn validation_error(message: &str, details: Option<serde_json::Value>) -> Self {
        Self {
            error: "validation_error".to_string(),
            message: message.to_string(),
            details,
        }
    }

    /// Create a bad request error response
    pub fn bad_request(message: &str) -> Self {
        Self {
            error: "bad_request".to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    /// Create an internal error response
    pub fn internal_error() -> Self {
        Self {
            error: "internal_error".to_string(),
            message: "An unexpected error occurred".to_string(),
            details: None,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Paginated response format
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(HistoryPage = PaginatedResponse<HistoryRecord>)]
pub struct PaginatedResponse<T> {
    /// Total count of items available
    pub total_count: usize,

    /// Current offset
    pub offset: usize,

    /// Current limit
    pub limit: usize,

    /// URL for the next page (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// URL for the previous page (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,

    /// Actual data items
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ErrorResponse::not_found("record").into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorResponse::bad_request("bad").into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorResponse::validation_error("invalid", None).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorResponse::internal_error().into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_details_omitted_when_absent() {
        let json = serde_json::to_value(ErrorResponse::bad_request("bad")).unwrap();
        assert_eq!(json["error"], "bad_request");
        assert!(json.get("details").is_none());
    }
}
