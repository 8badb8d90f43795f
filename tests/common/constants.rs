//! Shared constants for end-to-end tests
//!
//! When the fixture documents or server limits change, update only this file.

// ============================================================================
// Server
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Request timeout for HTTP client (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upload limit configured on the test server
pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024;

/// Concurrent conversions allowed on the test server
pub const TEST_MAX_CONCURRENT_CONVERSIONS: usize = 2;

/// How long to wait for a session directory to disappear (milliseconds)
pub const SESSION_CLEANUP_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Fixture Documents
// ============================================================================

/// Pages produced by the fake renderer by default
pub const TEST_PAGE_COUNT: u32 = 3;

/// Pages in the PDF built by `minimal_pdf`
pub const FIXTURE_PDF_PAGES: usize = 2;

/// Body the fake renderer writes for every page
pub const FAKE_JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00fake-page\xff\xd9";

/// Path of the PDF served by the test file host
pub const HOSTED_PDF_PATH: &str = "/files/report.pdf";

/// Path of a zero-length file on the test file host
pub const HOSTED_EMPTY_PATH: &str = "/files/empty.pdf";

/// Path of a PDF served without an extension or PDF content type
pub const HOSTED_OPAQUE_PATH: &str = "/files/download?id=42";

/// Path the test file host answers with 404
pub const HOSTED_MISSING_PATH: &str = "/files/missing.pdf";
