//! Test fixtures: PDF documents, a fake page renderer and a file host for URL downloads.

use super::constants::*;
use async_trait::async_trait;
use axum::{
    extract::RawQuery,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use pdf2jpg_server::conversion::{PageRenderer, RenderError, RenderedPage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

/// Builds a valid PDF with `pages` blank pages and a correct xref table.
pub fn minimal_pdf(pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 144 144] >>".to_string());
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

/// Renderer that writes `pages` placeholder JPEGs without touching the PDF.
pub struct FakeRenderer {
    pages: u32,
    calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<RenderedPage>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !pdf.exists() {
            return Err(RenderError::InfoFailed(format!("{:?} not found", pdf)));
        }

        tokio::fs::create_dir_all(out_dir).await?;
        let mut rendered = Vec::new();
        // Mimic pdftoppm's zero padded names
        for number in 1..=self.pages {
            let path = out_dir.join(format!("page-{:02}.jpg", number));
            tokio::fs::write(&path, FAKE_JPEG_BYTES).await?;
            rendered.push(RenderedPage { number, path });
        }
        Ok(rendered)
    }
}

/// A renderer that always fails, like pdftoppm on a corrupt document.
pub struct FailingRenderer;

#[async_trait]
impl PageRenderer for FailingRenderer {
    async fn render(&self, _pdf: &Path, _out_dir: &Path) -> Result<Vec<RenderedPage>, RenderError> {
        Err(RenderError::RenderFailed(
            "Syntax Error: Couldn't read xref table".to_string(),
        ))
    }
}

/// Local HTTP server standing in for a remote file host.
pub struct FileHost {
    pub base_url: String,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FileHost {
    pub async fn spawn() -> Self {
        let pdf = minimal_pdf(FIXTURE_PDF_PAGES);
        let opaque_pdf = pdf.clone();

        let app = Router::new()
            .route(
                "/files/report.pdf",
                get(move || async move { ([(header::CONTENT_TYPE, "application/pdf")], pdf) }),
            )
            .route(
                "/files/empty.pdf",
                get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], Vec::<u8>::new()) }),
            )
            .route(
                "/files/download",
                get(move |RawQuery(_query): RawQuery| async move {
                    (
                        [(header::CONTENT_TYPE, "application/octet-stream")],
                        opaque_pdf,
                    )
                        .into_response()
                }),
            )
            .fallback(|| async { (StatusCode::NOT_FOUND, "not found") });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind file host");
        let port = listener.local_addr().expect("No local address").port();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("File host failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for FileHost {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
