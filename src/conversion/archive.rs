//! Packing rendered pages into the ZIP returned to the client.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::renderer::RenderedPage;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Created ZIP is empty or missing")]
    Empty,

    #[error("Archive task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Entry names in archive order.
    pub entries: Vec<String>,
    pub size_bytes: u64,
}

/// Archive entry name for the `index`-th (0-based) page.
pub fn entry_name(index: usize) -> String {
    format!("page_{:03}.jpg", index + 1)
}

/// Writes `pages` into a deflated ZIP at `zip_path` on a blocking thread.
pub async fn create_zip(
    pages: Vec<RenderedPage>,
    zip_path: PathBuf,
) -> Result<ArchiveSummary, ArchiveError> {
    tokio::task::spawn_blocking(move || write_zip(&pages, &zip_path))
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}

fn write_zip(pages: &[RenderedPage], zip_path: &Path) -> Result<ArchiveSummary, ArchiveError> {
    info!("Creating ZIP: {:?}", zip_path);

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let mut entries = Vec::with_capacity(pages.len());

    for (index, page) in pages.iter().enumerate() {
        let mut source = match File::open(&page.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Skipping missing page image {:?}", page.path);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let name = entry_name(index);
        zip.start_file(name.as_str(), options)?;
        io::copy(&mut source, &mut zip)?;
        debug!("Added to ZIP: {}", name);
        entries.push(name);
    }

    zip.finish()?;

    let size_bytes = std::fs::metadata(zip_path).map(|m| m.len()).unwrap_or(0);
    if size_bytes == 0 {
        return Err(ArchiveError::Empty);
    }

    info!("ZIP created successfully: {} bytes", size_bytes);
    Ok(ArchiveSummary {
        path: zip_path.to_path_buf(),
        entries,
        size_bytes,
    })
}
