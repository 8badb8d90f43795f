use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub host: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub temp_dir: Option<String>,
    pub max_upload_mb: Option<u64>,
    pub max_concurrent_conversions: Option<usize>,

    // Feature configs
    pub conversion: Option<ConversionConfig>,
    pub download: Option<DownloadConfig>,
    pub cleanup: Option<CleanupConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ConversionConfig {
    pub dpi: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub render_threads: Option<usize>,
    pub render_timeout_secs: Option<u64>,
    /// Directory holding the poppler binaries, when they are not on PATH.
    pub poppler_path: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: Option<u64>,
    pub max_mb: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CleanupConfig {
    pub interval_minutes: Option<u64>,
    pub min_age_minutes: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
