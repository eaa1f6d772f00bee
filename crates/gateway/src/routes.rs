use crate::{error::ApiError, state::AppState};
use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
};
use inference::{CancelFlag, DetectionResult};
use std::time::Instant;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// `POST /detect`: run the detector on the uploaded `file` and return the
/// allowlisted objects. A request without a file yields an empty list.
#[tracing::instrument(skip_all)]
pub async fn detect(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<DetectionResult>>, ApiError> {
    let started = Instant::now();

    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!(reason = %rejection.body_text(), "Request is not multipart");
            state.metrics.record_empty();
            return Ok(Json(Vec::new()));
        }
    };

    let bytes = match read_file_field(&mut multipart).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!("No file field in upload");
            state.metrics.record_empty();
            return Ok(Json(Vec::new()));
        }
        Err(e) => {
            let err = ApiError::from(e);
            state.metrics.record_failure(err.outcome(), started.elapsed());
            return Err(err);
        }
    };

    let upload_bytes = bytes.len();
    let detector = state.detector.clone();
    let cancel = CancelFlag::new();
    // Also fires when the client goes away and this future is dropped
    let _cancel_on_drop = cancel.drop_guard();

    let job_cancel = cancel.clone();
    let job = tokio::task::spawn_blocking(move || detector.detect(&bytes, &job_cancel));

    let outcome = match tokio::time::timeout(state.request_timeout, job).await {
        Err(_) => {
            cancel.cancel();
            Err(ApiError::Timeout(state.request_timeout))
        }
        Ok(Err(join_error)) => Err(ApiError::Worker(join_error.to_string())),
        Ok(Ok(result)) => result.map_err(ApiError::from),
    };

    let elapsed = started.elapsed();
    match outcome {
        Ok(results) => {
            tracing::info!(
                upload_bytes,
                results = results.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Detection served"
            );
            state.metrics.record_success(elapsed, results.len());
            Ok(Json(results))
        }
        Err(err) => {
            state.metrics.record_failure(err.outcome(), elapsed);
            Err(err)
        }
    }
}

/// Skip fields until the uploaded file part; `None` when the form has none.
/// A `file` field without a filename is a plain form value, not an upload.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<Bytes>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) && field.file_name().is_some() {
            return field.bytes().await.map(Some);
        }
    }
    Ok(None)
}
