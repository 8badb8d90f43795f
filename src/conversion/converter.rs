//! End-to-end conversion of one PDF into a ZIP of page images.

use axum::body::Bytes;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::archive::{create_zip, ArchiveError, ArchiveSummary};
use super::download::{DownloadError, PdfDownloader};
use super::renderer::{PageRenderer, RenderError};
use super::workspace::{looks_like_pdf, SessionDir, Workspace, WorkspaceError};
use crate::server::metrics;

/// Where the input PDF comes from.
#[derive(Debug, Clone)]
pub enum PdfSource {
    /// `data` shares the request body buffer.
    Upload { filename: String, data: Bytes },
    Url(String),
}

impl PdfSource {
    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PdfSource::Upload { .. } => "upload",
            PdfSource::Url(_) => "url",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("The PDF file is empty")]
    EmptyUpload,

    #[error("The file is not a valid PDF")]
    NotAPdf,

    #[error("Could not download the PDF: {0}")]
    Download(#[from] DownloadError),

    #[error("Invalid or empty PDF")]
    InvalidInput,

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("No images were generated from the PDF")]
    NoPages,

    #[error("Could not create the ZIP file: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Workspace error: {0}")]
    Workspace(WorkspaceError),

    #[error("Conversion service is shutting down")]
    Unavailable,
}

impl From<WorkspaceError> for ConversionError {
    fn from(e: WorkspaceError) -> Self {
        match e {
            WorkspaceError::EmptyUpload => ConversionError::EmptyUpload,
            other => ConversionError::Workspace(other),
        }
    }
}

impl ConversionError {
    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::EmptyUpload => "empty_upload",
            ConversionError::NotAPdf => "not_a_pdf",
            ConversionError::Download(_) => "download",
            ConversionError::InvalidInput => "invalid_input",
            ConversionError::Render(_) => "render",
            ConversionError::NoPages => "no_pages",
            ConversionError::Archive(_) => "archive",
            ConversionError::Workspace(_) => "workspace",
            ConversionError::Unavailable => "unavailable",
        }
    }
}

/// A finished conversion. The archive lives inside `session` and goes away with it.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub session: SessionDir,
    pub archive: ArchiveSummary,
    pub page_count: usize,
}

pub struct PdfConverter {
    workspace: Workspace,
    downloader: PdfDownloader,
    renderer: Arc<dyn PageRenderer>,
    limiter: Semaphore,
}

impl PdfConverter {
    pub fn new(
        workspace: Workspace,
        downloader: PdfDownloader,
        renderer: Arc<dyn PageRenderer>,
        max_concurrent_conversions: usize,
    ) -> Self {
        Self {
            workspace,
            downloader,
            renderer,
            limiter: Semaphore::new(max_concurrent_conversions.max(1)),
        }
    }

    /// Stops accepting conversions. Requests still waiting for a permit fail with `Unavailable`.
    pub fn close(&self) {
        self.limiter.close();
    }

    pub async fn convert(&self, source: PdfSource) -> Result<ConversionOutcome, ConversionError> {
        let source_kind = source.kind();
        let start = Instant::now();

        let result = self.convert_inner(source).await;

        match &result {
            Ok(outcome) => {
                info!(
                    "Conversion succeeded: {} images, ZIP: {} bytes ({}ms)",
                    outcome.page_count,
                    outcome.archive.size_bytes,
                    start.elapsed().as_millis()
                );
                metrics::record_conversion(source_kind, "success", start.elapsed());
                metrics::record_pages_rendered(outcome.page_count);
            }
            Err(e) => {
                error!("Conversion failed ({}): {}", source_kind, e);
                metrics::record_conversion(source_kind, e.kind(), start.elapsed());
            }
        }

        result
    }

    async fn convert_inner(&self, source: PdfSource) -> Result<ConversionOutcome, ConversionError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ConversionError::Unavailable)?;

        // Dropping the session on any early return removes its directory.
        let session = self.workspace.create_session().await?;
        let pdf_path = session.input_pdf_path();

        match source {
            PdfSource::Url(url) => {
                info!("Processing URL: {}", url);
                let size = self.downloader.download(&url, &pdf_path).await?;
                metrics::record_downloaded_bytes(size);
            }
            PdfSource::Upload { filename, data } => {
                info!("Processing file: {} ({} bytes)", filename, data.len());
                if data.is_empty() {
                    return Err(ConversionError::EmptyUpload);
                }
                if !looks_like_pdf(&data) {
                    return Err(ConversionError::NotAPdf);
                }
                session.save_upload(&data).await?;
            }
        }

        match tokio::fs::metadata(&pdf_path).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Err(ConversionError::InvalidInput),
        }

        let pages = self.renderer.render(&pdf_path, &session.pages_dir()).await?;
        if pages.is_empty() {
            return Err(ConversionError::NoPages);
        }

        let archive = create_zip(pages, session.archive_path()).await?;
        let page_count = archive.entries.len();
        if page_count == 0 {
            return Err(ConversionError::NoPages);
        }

        Ok(ConversionOutcome {
            session,
            archive,
            page_count,
        })
    }
}
