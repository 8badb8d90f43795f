//! Page rasterization using poppler's pdfinfo/pdftoppm.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ConversionSettings;

/// File name prefix handed to pdftoppm; it appends `-<page>.jpg`.
const OUTPUT_PREFIX: &str = "page";

/// Errors that can occur while rendering a PDF.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdfinfo failed: {0}")]
    InfoFailed(String),

    #[error("pdftoppm failed: {0}")]
    RenderFailed(String),

    #[error("Rendering timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// A rendered page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 1-based page number.
    pub number: u32,
    pub path: PathBuf,
}

/// Turns a PDF into one JPEG per page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renders every page of `pdf` into `out_dir`, sorted by page number.
    async fn render(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<RenderedPage>, RenderError>;
}

pub struct PopplerRenderer {
    settings: ConversionSettings,
}

impl PopplerRenderer {
    pub fn new(settings: ConversionSettings) -> Self {
        Self { settings }
    }

    fn command(&self, program: &str) -> Command {
        let program = match &self.settings.poppler_path {
            Some(dir) => dir.join(program),
            None => PathBuf::from(program),
        };
        let mut command = Command::new(program);
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Number of pages in `pdf`, as reported by pdfinfo.
    pub async fn page_count(&self, pdf: &Path) -> Result<u32, RenderError> {
        let output = self.command("pdfinfo").arg(pdf).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::InfoFailed(stderr.trim().to_string()));
        }

        parse_page_count(&String::from_utf8_lossy(&output.stdout))
    }

    async fn render_range(
        &self,
        pdf: &Path,
        out_dir: &Path,
        range: RangeInclusive<u32>,
    ) -> Result<(), RenderError> {
        debug!("Rendering pages {}-{} of {:?}", range.start(), range.end(), pdf);

        let output = self
            .command("pdftoppm")
            .arg("-jpeg")
            .args(["-r", &self.settings.dpi.to_string()])
            .args([
                "-jpegopt",
                &format!("quality={},optimize=y", self.settings.jpeg_quality),
            ])
            .args(["-f", &range.start().to_string()])
            .args(["-l", &range.end().to_string()])
            .arg(pdf)
            .arg(out_dir.join(OUTPUT_PREFIX))
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::RenderFailed(stderr.trim().to_string()));
        }

        Ok(())
    }

    /// Check that pdfinfo and pdftoppm can be executed.
    pub async fn check_available(&self) -> Result<(), RenderError> {
        for program in ["pdfinfo", "pdftoppm"] {
            let status = self
                .command(program)
                .arg("-v")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;

            if !matches!(status, Ok(s) if s.success()) {
                return Err(RenderError::InfoFailed(format!(
                    "{} not found or not working",
                    program
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageRenderer for PopplerRenderer {
    async fn render(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<RenderedPage>, RenderError> {
        info!("Converting PDF: {:?}", pdf);
        tokio::fs::create_dir_all(out_dir).await?;

        let timeout = self.settings.render_timeout;
        let work = async {
            let pages = self.page_count(pdf).await?;
            if pages == 0 {
                return Ok(Vec::new());
            }

            let ranges = split_page_ranges(pages, self.settings.render_threads);
            try_join_all(
                ranges
                    .into_iter()
                    .map(|range| self.render_range(pdf, out_dir, range)),
            )
            .await?;

            collect_rendered_pages(out_dir).await
        };

        // Dropping `work` on timeout kills any pdftoppm still running.
        let pages = tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| RenderError::Timeout(timeout.as_secs()))??;

        info!("Conversion completed: {} images", pages.len());
        Ok(pages)
    }
}

fn parse_page_count(pdfinfo_output: &str) -> Result<u32, RenderError> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .ok_or_else(|| RenderError::InvalidOutput("pdfinfo reported no page count".to_string()))?
        .trim()
        .parse()
        .map_err(|e| RenderError::InvalidOutput(format!("Bad page count: {}", e)))
}

/// Splits `1..=pages` into at most `parts` contiguous, near-equal ranges.
fn split_page_ranges(pages: u32, parts: usize) -> Vec<RangeInclusive<u32>> {
    if pages == 0 {
        return Vec::new();
    }
    let parts = (parts.max(1) as u32).min(pages);
    let base = pages / parts;
    let extra = pages % parts;

    let mut ranges = Vec::with_capacity(parts as usize);
    let mut first = 1;
    for i in 0..parts {
        let len = base + u32::from(i < extra);
        ranges.push(first..=first + len - 1);
        first += len;
    }
    ranges
}

/// Page number of a pdftoppm output file such as `page-007.jpg`.
fn page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(OUTPUT_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}

async fn collect_rendered_pages(out_dir: &Path) -> Result<Vec<RenderedPage>, RenderError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(out_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(number) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(page_number)
        {
            pages.push(RenderedPage { number, path });
        }
    }

    pages.sort_by_key(|p| p.number);
    Ok(pages)
}
