mod file_config;

pub use file_config::{CleanupConfig, ConversionConfig, DownloadConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub temp_dir: PathBuf,
    pub max_upload_mb: u64,
    pub max_concurrent_conversions: usize,
    pub dpi: u32,
    pub jpeg_quality: u8,
    pub render_threads: usize,
    pub render_timeout_secs: u64,
    pub poppler_path: Option<PathBuf>,
    pub download_timeout_secs: u64,
    pub download_max_mb: u64,
    pub cleanup_interval_minutes: u64,
    pub cleanup_min_age_minutes: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        let conversion = ConversionSettings::default();
        let download = DownloadSettings::default();
        let cleanup = CleanupSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::default(),
            temp_dir: PathBuf::from("temp"),
            max_upload_mb: 100,
            max_concurrent_conversions: 2,
            dpi: conversion.dpi,
            jpeg_quality: conversion.jpeg_quality,
            render_threads: conversion.render_threads,
            render_timeout_secs: conversion.render_timeout.as_secs(),
            poppler_path: None,
            download_timeout_secs: download.timeout.as_secs(),
            download_max_mb: download.max_bytes / BYTES_PER_MB,
            cleanup_interval_minutes: cleanup.interval.as_secs() / 60,
            cleanup_min_age_minutes: cleanup.min_age.as_secs() / 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub temp_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_concurrent_conversions: usize,

    // Feature configs (with defaults)
    pub conversion: ConversionSettings,
    pub download: DownloadSettings,
    pub cleanup: CleanupSettings,
}

/// How pages are rasterized.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSettings {
    pub dpi: u32,
    pub jpeg_quality: u8,
    /// Number of pdftoppm processes rendering disjoint page ranges of one document.
    pub render_threads: usize,
    pub render_timeout: Duration,
    pub poppler_path: Option<PathBuf>,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            dpi: 200,
            jpeg_quality: 85,
            render_threads: 2,
            render_timeout: Duration::from_secs(300),
            poppler_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub timeout: Duration,
    pub max_bytes: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_bytes: 200 * BYTES_PER_MB,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupSettings {
    pub interval: Duration,
    /// Session directories younger than this are never swept.
    pub min_age: Duration,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            min_age: Duration::from_secs(60 * 60),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        if port == metrics_port && port != 0 {
            bail!("port and metrics_port must differ (both are {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let temp_dir = file
            .temp_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.temp_dir.clone());
        if temp_dir.exists() && !temp_dir.is_dir() {
            bail!("temp_dir is not a directory: {:?}", temp_dir);
        }

        let max_upload_mb = file.max_upload_mb.unwrap_or(cli.max_upload_mb);
        if max_upload_mb == 0 {
            bail!("max_upload_mb must be at least 1");
        }

        let max_concurrent_conversions = file
            .max_concurrent_conversions
            .unwrap_or(cli.max_concurrent_conversions);
        if max_concurrent_conversions == 0 {
            bail!("max_concurrent_conversions must be at least 1");
        }

        // Conversion settings - merge file config with CLI
        let conv_file = file.conversion.unwrap_or_default();
        let conversion = ConversionSettings {
            dpi: conv_file.dpi.unwrap_or(cli.dpi),
            jpeg_quality: conv_file.jpeg_quality.unwrap_or(cli.jpeg_quality),
            render_threads: conv_file.render_threads.unwrap_or(cli.render_threads),
            render_timeout: Duration::from_secs(
                conv_file
                    .render_timeout_secs
                    .unwrap_or(cli.render_timeout_secs),
            ),
            poppler_path: conv_file
                .poppler_path
                .map(PathBuf::from)
                .or_else(|| cli.poppler_path.clone()),
        };
        if !(1..=1200).contains(&conversion.dpi) {
            bail!("dpi must be between 1 and 1200, got {}", conversion.dpi);
        }
        if !(1..=100).contains(&conversion.jpeg_quality) {
            bail!(
                "jpeg_quality must be between 1 and 100, got {}",
                conversion.jpeg_quality
            );
        }
        if conversion.render_threads == 0 {
            bail!("render_threads must be at least 1");
        }
        if let Some(dir) = &conversion.poppler_path {
            if !dir.is_dir() {
                bail!("poppler_path is not a directory: {:?}", dir);
            }
        }

        let dl_file = file.download.unwrap_or_default();
        let download = DownloadSettings {
            timeout: Duration::from_secs(dl_file.timeout_secs.unwrap_or(cli.download_timeout_secs)),
            max_bytes: dl_file.max_mb.unwrap_or(cli.download_max_mb) * BYTES_PER_MB,
        };

        let cl_file = file.cleanup.unwrap_or_default();
        let cleanup = CleanupSettings {
            interval: Duration::from_secs(
                cl_file
                    .interval_minutes
                    .unwrap_or(cli.cleanup_interval_minutes)
                    * 60,
            ),
            min_age: Duration::from_secs(
                cl_file
                    .min_age_minutes
                    .unwrap_or(cli.cleanup_min_age_minutes)
                    * 60,
            ),
        };
        if cleanup.interval.is_zero() {
            bail!("cleanup interval must be at least 1 minute");
        }

        Ok(Self {
            host,
            port,
            metrics_port,
            logging_level,
            temp_dir,
            max_upload_bytes: (max_upload_mb * BYTES_PER_MB) as usize,
            max_concurrent_conversions,
            conversion,
            download,
            cleanup,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_bind_address(&self) -> String {
        format!("{}:{}", self.host, self.metrics_port)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
