//! `POST /convert/`: PDF upload or URL in, ZIP of page images out.

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::error::{ApiError, AMBIGUOUS_INPUT, MISSING_INPUT, NOT_A_PDF_FILENAME};
use super::metrics;
use super::state::ServerState;
use crate::conversion::{is_pdf_filename, ConversionOutcome, PdfSource, SessionDir};

pub const ARCHIVE_FILENAME: &str = "converted_images.zip";

#[derive(Debug)]
struct UploadedPdf {
    filename: String,
    data: Bytes,
}

#[derive(Debug, Default)]
struct ConvertInput {
    pdf: Option<UploadedPdf>,
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlForm {
    #[serde(default)]
    pdf_url: Option<String>,
}

/// Streams the archive from disk and owns the session, so the session
/// directory goes away once the body is sent or the client disconnects.
struct ArchiveStream {
    inner: ReaderStream<File>,
    _session: SessionDir,
}

impl Stream for ArchiveStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::new(e.status(), e.body_text())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_multipart(mut multipart: Multipart) -> Result<ConvertInput, ApiError> {
    let mut input = ConvertInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "pdf" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was picked
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                input.pdf = Some(UploadedPdf { filename, data });
            }
            "pdf_url" => {
                let value = field.text().await.map_err(multipart_error)?;
                input.pdf_url = non_empty(&value);
            }
            other => debug!("Ignoring unknown form field '{}'", other),
        }
    }

    Ok(input)
}

/// Reads `pdf`/`pdf_url` from a multipart or urlencoded form. Any other body carries neither.
async fn read_input(request: Request) -> Result<ConvertInput, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(multipart).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<UrlForm>::from_request(request, &())
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        Ok(ConvertInput {
            pdf: None,
            pdf_url: form.pdf_url.as_deref().and_then(non_empty),
        })
    } else {
        Ok(ConvertInput::default())
    }
}

fn select_source(input: ConvertInput) -> Result<PdfSource, ApiError> {
    match (input.pdf, input.pdf_url) {
        (None, None) => Err(ApiError::unprocessable(MISSING_INPUT)),
        (Some(_), Some(_)) => Err(ApiError::unprocessable(AMBIGUOUS_INPUT)),
        (None, Some(url)) => Ok(PdfSource::Url(url)),
        (Some(upload), None) => {
            if !is_pdf_filename(&upload.filename) {
                return Err(ApiError::bad_request(NOT_A_PDF_FILENAME));
            }
            Ok(PdfSource::Upload {
                filename: upload.filename,
                data: upload.data,
            })
        }
    }
}

async fn archive_response(outcome: ConversionOutcome) -> Result<Response, ApiError> {
    let ConversionOutcome {
        session, archive, ..
    } = outcome;

    let file = File::open(&archive.path).await.map_err(ApiError::internal)?;
    let stream = ArchiveStream {
        inner: ReaderStream::new(file),
        _session: session,
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", ARCHIVE_FILENAME),
        )
        .header(header::CONTENT_LENGTH, archive.size_bytes)
        .body(Body::from_stream(stream))
        .map_err(ApiError::internal)
}

async fn handle_convert(state: &ServerState, request: Request) -> Result<Response, ApiError> {
    let input = read_input(request).await?;
    let source = select_source(input)?;
    let outcome = state.converter.convert(source).await?;
    archive_response(outcome).await
}

pub async fn convert_pdf(State(state): State<ServerState>, request: Request) -> Response {
    match handle_convert(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Convert request failed with {}: {}", e.status, e.detail);
            let error_type = if e.status.is_client_error() {
                "client"
            } else {
                "server"
            };
            metrics::record_error(error_type, "convert");
            e.into_response()
        }
    }
}
