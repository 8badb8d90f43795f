//! PDF2JPG Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod cleanup;
pub mod config;
pub mod conversion;
pub mod server;

// Re-export commonly used types for convenience
pub use cleanup::{SweepReport, TempSweeper};
pub use conversion::{PageRenderer, PdfConverter, PdfSource, PopplerRenderer};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
