//! Fetching remote PDFs into a session directory.

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::config::DownloadSettings;

// Some file hosts (Google Drive among them) refuse requests without a browser user agent.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const ACCEPT_PDF: &str = "application/pdf,*/*";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Downloaded file is empty")]
    Empty,

    #[error("Download exceeds the {0} bytes limit")]
    TooLarge(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP client used for `pdf_url` conversions.
pub struct PdfDownloader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl PdfDownloader {
    pub fn new(settings: &DownloadSettings) -> Result<Self, DownloadError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_PDF));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
        })
    }

    /// Streams `url` into `dest`, returning the number of bytes written.
    ///
    /// The partial file is removed on any failure.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        info!("Downloading PDF from: {}", url);

        let result = self.download_inner(url, dest).await;
        match &result {
            Ok(size) => info!("PDF downloaded successfully: {} bytes", size),
            Err(e) => {
                error!("Error downloading PDF: {}", e);
                if let Err(rm_err) = tokio::fs::remove_file(dest).await {
                    if rm_err.kind() != std::io::ErrorKind::NotFound {
                        warn!("Could not remove partial download {:?}: {}", dest, rm_err);
                    }
                }
            }
        }
        result
    }

    async fn download_inner(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| DownloadError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let response = self.client.get(parsed).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("pdf") && !url.to_lowercase().ends_with(".pdf") {
            warn!("Suspicious Content-Type: {}", content_type);
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(DownloadError::TooLarge(self.max_bytes));
            }
        }

        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(DownloadError::TooLarge(self.max_bytes));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(DownloadError::Empty);
        }

        Ok(written)
    }
}
