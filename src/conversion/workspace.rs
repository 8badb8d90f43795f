//! Per-request scratch directories under the service temp dir.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

const INPUT_PDF_NAME: &str = "input.pdf";
const ARCHIVE_NAME: &str = "images.zip";
const PAGES_DIR_NAME: &str = "pages";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Uploaded file is empty")]
    EmptyUpload,
}

/// Owner of the temp directory all sessions are created in.
#[derive(Debug, Clone)]
pub struct Workspace {
    temp_dir: PathBuf,
}

impl Workspace {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Creates the temp directory if it does not exist yet.
    pub async fn init(&self) -> Result<(), WorkspaceError> {
        fs::create_dir_all(&self.temp_dir).await?;
        Ok(())
    }

    /// Creates a fresh, uniquely named session directory.
    pub async fn create_session(&self) -> Result<SessionDir, WorkspaceError> {
        let id = Uuid::new_v4().to_string();
        let path = self.temp_dir.join(&id);
        fs::create_dir_all(&path).await?;
        debug!("Created session directory {:?}", path);
        Ok(SessionDir { id, path })
    }
}

/// A request's scratch directory. The directory tree is removed when this value is dropped.
#[derive(Debug)]
pub struct SessionDir {
    id: String,
    path: PathBuf,
}

impl SessionDir {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn input_pdf_path(&self) -> PathBuf {
        self.path.join(INPUT_PDF_NAME)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.path.join(ARCHIVE_NAME)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.path.join(PAGES_DIR_NAME)
    }

    /// Writes uploaded bytes as the session's input PDF.
    pub async fn save_upload(&self, data: &[u8]) -> Result<PathBuf, WorkspaceError> {
        if data.is_empty() {
            return Err(WorkspaceError::EmptyUpload);
        }

        let file_path = self.input_pdf_path();
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(file_path)
    }
}

impl Drop for SessionDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Cleaned up session directory {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not clean up directory {:?}: {}", self.path, e),
        }
    }
}

/// Whether an upload's filename ends in `.pdf` (any case).
pub fn is_pdf_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Sniffs the magic number of `data`.
pub fn looks_like_pdf(data: &[u8]) -> bool {
    infer::get(data)
        .map(|kind| kind.mime_type() == "application/pdf")
        .unwrap_or(false)
}
