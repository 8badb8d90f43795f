//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own temp directory and renderer.

use super::constants::*;
use super::fixtures::FakeRenderer;
use pdf2jpg_server::config::DownloadSettings;
use pdf2jpg_server::conversion::{PageRenderer, PdfConverter, PdfDownloader, Workspace};
use pdf2jpg_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated temp directory
///
/// When dropped, the server gracefully shuts down and the temp directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Directory the server creates its session directories in
    pub temp_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server whose renderer produces `TEST_PAGE_COUNT` placeholder pages
    pub async fn spawn() -> Self {
        Self::spawn_with_renderer(Arc::new(FakeRenderer::new(TEST_PAGE_COUNT))).await
    }

    /// Spawns a new test server on a random port using `renderer`
    ///
    /// # Panics
    ///
    /// Panics if the temp dir cannot be created, binding fails or the server
    /// doesn't become ready within timeout.
    pub async fn spawn_with_renderer(renderer: Arc<dyn PageRenderer>) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let temp_dir = temp.path().join("temp");

        let workspace = Workspace::new(&temp_dir);
        workspace.init().await.expect("Failed to init workspace");

        let downloader = PdfDownloader::new(&DownloadSettings {
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            ..Default::default()
        })
        .expect("Failed to build downloader");

        let converter = Arc::new(PdfConverter::new(
            workspace,
            downloader,
            renderer,
            TEST_MAX_CONCURRENT_CONVERSIONS,
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
        };
        let app = make_app(config, converter);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            temp_dir,
            _temp_dir: temp,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Number of session directories currently present
    pub fn session_count(&self) -> usize {
        count_entries(&self.temp_dir)
    }

    /// Polls until every session directory is gone. Returns false on timeout.
    ///
    /// The session is removed when the response body is dropped on the server,
    /// which can happen just after the client has read the last byte.
    pub async fn wait_for_sessions_removed(&self) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(SESSION_CLEANUP_TIMEOUT_MS) {
            if self.session_count() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.session_count() == 0
    }

    /// Waits for the server to become ready by polling the /health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
