use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::DetectError;
use serde_json::json;
use std::time::Duration;

/// Everything `/detect` can answer besides a detection list.
#[derive(Debug)]
pub enum ApiError {
    Detect(DetectError),
    Upload(MultipartError),
    Timeout(Duration),
    Worker(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Detect(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Detect(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(e) => e.status(),
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used as the `outcome` metric attribute.
    pub fn outcome(&self) -> &'static str {
        match self {
            ApiError::Detect(e) if e.is_client_error() => "bad_image",
            ApiError::Detect(DetectError::Cancelled) => "cancelled",
            ApiError::Detect(_) => "inference_error",
            ApiError::Upload(_) => "bad_upload",
            ApiError::Timeout(_) => "timeout",
            ApiError::Worker(_) => "worker_error",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Detect(e) => e.to_string(),
            ApiError::Upload(e) => format!("Invalid upload: {}", e.body_text()),
            ApiError::Timeout(limit) => format!("Detection exceeded {} ms", limit.as_millis()),
            ApiError::Worker(reason) => format!("Detection worker failed: {}", reason),
        }
    }
}

impl From<DetectError> for ApiError {
    fn from(err: DetectError) -> Self {
        ApiError::Detect(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Detection request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Detection request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Detect(DetectError::EmptyImage).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Detect(DetectError::MalformedOutput("2 dims".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Detect(DetectError::Inference(anyhow::anyhow!("boom"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Timeout(Duration::from_millis(5)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::Worker("panicked".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ApiError::Detect(DetectError::EmptyImage).outcome(), "bad_image");
        assert_eq!(
            ApiError::Detect(DetectError::Inference(anyhow::anyhow!("boom"))).outcome(),
            "inference_error"
        );
        assert_eq!(ApiError::Timeout(Duration::ZERO).outcome(), "timeout");
        assert_eq!(ApiError::Detect(DetectError::Cancelled).outcome(), "cancelled");
    }

    #[test]
    fn test_timeout_message() {
        let err = ApiError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.message(), "Detection exceeded 1500 ms");
    }
}
