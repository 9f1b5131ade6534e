use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tapster_axum::response::error_response;
use thiserror::Error;

use crate::drinks::CatalogError;

/// A request-level failure, rendered in the uniform error shape
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request")]
    BadRequest,

    #[error("resource not found")]
    NotFound,

    #[error("unprocessable entity")]
    Unprocessable,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Resource is not found",
            Self::Unprocessable => "Unprocessable Entity",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.message())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(_) => Self::NotFound,
            CatalogError::TitleRequired => Self::BadRequest,
            CatalogError::Constraint(reason) => {
                tracing::debug!(reason, "catalog constraint violated");
                Self::Unprocessable
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let error: &dyn std::error::Error = &rejection;
        tracing::debug!(error, "request body rejected");

        match rejection {
            JsonRejection::JsonDataError(_) => Self::Unprocessable,
            _ => Self::BadRequest,
        }
    }
}

// Ids that do not parse cannot name a drink.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_errors_map_to_request_errors() {
        assert_eq!(
            ApiError::from(CatalogError::NotFound(3)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CatalogError::TitleRequired).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CatalogError::Constraint("title must be unique")).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn messages_match_status() {
        assert_eq!(ApiError::NotFound.message(), "Resource is not found");
        assert_eq!(ApiError::Unprocessable.message(), "Unprocessable Entity");
        assert_eq!(ApiError::BadRequest.message(), "Bad Request");
    }
}
