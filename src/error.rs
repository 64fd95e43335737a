use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use tracing::error;

use crate::repo::RepoError;
use crate::storage::BlobStoreError;
use crate::workflow::WorkflowError;

/// Body returned for every failure whose details must not reach the client.
pub const GENERIC_FAILURE: &str = "operation failed, please try again";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")] NotFound,
    #[error("{0}")] Conflict(String),
    #[error("{0}")] Unprocessable(String),
    #[error("{0}")] BadRequest(String),
    #[error("forbidden")] Forbidden,
    #[error("payload too large")] PayloadTooLarge,
    #[error("unsupported media type")] UnsupportedMedia,
    #[error("operation failed, please try again")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict => ApiError::Conflict("conflict".into()),
            RepoError::Internal(msg) => {
                error!("repository failure: {msg}");
                ApiError::Internal
            }
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Repo(e) => e.into(),
            WorkflowError::DraftExists(_)
            | WorkflowError::NotEditable { .. }
            | WorkflowError::Transition(_) => ApiError::Conflict(e.to_string()),
            WorkflowError::Validation(msg) => ApiError::Unprocessable(msg),
            WorkflowError::Storage(BlobStoreError::InvalidPath(p)) => {
                ApiError::BadRequest(format!("invalid path: {p}"))
            }
            e @ (WorkflowError::MissingStagedFile(_)
            | WorkflowError::ForeignStagedPath(_)
            | WorkflowError::Storage(_)) => {
                error!("storage integrity failure: {e}");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DraftStatus;

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::DraftExists(1), StatusCode::CONFLICT),
            (WorkflowError::NotEditable { draft_id: 1, status: DraftStatus::Pending }, StatusCode::CONFLICT),
            (WorkflowError::Validation("title".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (WorkflowError::Repo(RepoError::NotFound), StatusCode::NOT_FOUND),
            (WorkflowError::MissingStagedFile("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (WorkflowError::Storage(BlobStoreError::Other("s3 down".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn internal_failures_hide_details() {
        let api = ApiError::from(WorkflowError::Storage(BlobStoreError::Other("bucket secret-x".into())));
        assert_eq!(api.to_string(), GENERIC_FAILURE);
    }
}
