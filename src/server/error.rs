//! JSON error responses of the form `{"detail": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::conversion::ConversionError;

pub const MISSING_INPUT: &str = "Provide either 'pdf' (file) or 'pdf_url' (URL)";
pub const AMBIGUOUS_INPUT: &str = "Provide only 'pdf' or 'pdf_url', not both";
pub const NOT_A_PDF_FILENAME: &str = "The file must be a PDF";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn internal(reason: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", reason),
        )
    }
}

impl From<ConversionError> for ApiError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::EmptyUpload => ApiError::bad_request("The PDF file is empty"),
            ConversionError::NotAPdf => ApiError::bad_request("The file is not a valid PDF"),
            ConversionError::Download(_) => {
                ApiError::bad_request("Could not download the PDF from the URL")
            }
            ConversionError::InvalidInput => ApiError::bad_request("Invalid or empty PDF"),
            ConversionError::Render(_) | ConversionError::NoPages => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not generate images from the PDF",
            ),
            ConversionError::Archive(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not create the ZIP file",
            ),
            ConversionError::Unavailable => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Conversion service is shutting down",
            ),
            other @ ConversionError::Workspace(_) => ApiError::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{ArchiveError, DownloadError, RenderError, WorkspaceError};

    #[test]
    fn maps_conversion_errors_to_statuses() {
        let cases: Vec<(ConversionError, StatusCode, &str)> = vec![
            (
                ConversionError::EmptyUpload,
                StatusCode::BAD_REQUEST,
                "The PDF file is empty",
            ),
            (
                ConversionError::Download(DownloadError::Empty),
                StatusCode::BAD_REQUEST,
                "Could not download the PDF from the URL",
            ),
            (
                ConversionError::InvalidInput,
                StatusCode::BAD_REQUEST,
                "Invalid or empty PDF",
            ),
            (
                ConversionError::Render(RenderError::RenderFailed("syntax error".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not generate images from the PDF",
            ),
            (
                ConversionError::NoPages,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not generate images from the PDF",
            ),
            (
                ConversionError::Archive(ArchiveError::Empty),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not create the ZIP file",
            ),
            (
                ConversionError::Unavailable,
                StatusCode::SERVICE_UNAVAILABLE,
                "Conversion service is shutting down",
            ),
        ];

        for (error, status, detail) in cases {
            let api: ApiError = error.into();
            assert_eq!(api.status, status);
            assert_eq!(api.detail, detail);
        }
    }

    #[test]
    fn unexpected_errors_carry_reason() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let api: ApiError = ConversionError::Workspace(WorkspaceError::Io(io)).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(api.detail.starts_with("Internal server error: "));
        assert!(api.detail.contains("denied"));
    }

    #[tokio::test]
    async fn renders_detail_body() {
        let response = ApiError::unprocessable(MISSING_INPUT).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], MISSING_INPUT);
    }
}
