//! PDF to JPEG conversion: session workspaces, downloads, rendering and archiving.

mod archive;
mod converter;
mod download;
mod renderer;
mod workspace;

pub use archive::{create_zip, entry_name, ArchiveError, ArchiveSummary};
pub use converter::{ConversionError, ConversionOutcome, PdfConverter, PdfSource};
pub use download::{DownloadError, PdfDownloader};
pub use renderer::{PageRenderer, PopplerRenderer, RenderError, RenderedPage};
pub use workspace::{is_pdf_filename, looks_like_pdf, SessionDir, Workspace, WorkspaceError};
