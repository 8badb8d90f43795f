//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Info Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /health
    pub async fn health(&self) -> Response {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .expect("Health request failed")
    }

    // ========================================================================
    // Conversion Endpoints
    // ========================================================================

    /// POST /convert/ with an arbitrary multipart form
    pub async fn convert_form(&self, form: Form) -> Response {
        self.client
            .post(format!("{}/convert/", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Convert request failed")
    }

    /// POST /convert/ uploading `data` as the `pdf` field
    pub async fn convert_upload(&self, filename: &str, data: Vec<u8>) -> Response {
        self.convert_form(Self::upload_form(filename, data)).await
    }

    /// POST /convert/ with `pdf_url` as a multipart text field
    pub async fn convert_url(&self, url: &str) -> Response {
        self.convert_form(Form::new().text("pdf_url", url.to_string()))
            .await
    }

    /// POST /convert with `pdf_url` as a urlencoded form
    pub async fn convert_url_urlencoded(&self, url: &str) -> Response {
        self.client
            .post(format!("{}/convert", self.base_url))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("pdf_url={}", encode_form_value(url)))
            .send()
            .await
            .expect("Convert request failed")
    }

    /// POST /convert/ without any body
    pub async fn convert_empty(&self) -> Response {
        self.client
            .post(format!("{}/convert/", self.base_url))
            .send()
            .await
            .expect("Convert request failed")
    }

    pub fn upload_form(filename: &str, data: Vec<u8>) -> Form {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .expect("Invalid mime type");
        Form::new().part("pdf", part)
    }
}

fn encode_form_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
