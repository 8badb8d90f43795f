use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pdf2jpg_server::cleanup::TempSweeper;
use pdf2jpg_server::config;
use pdf2jpg_server::conversion::{PdfConverter, PdfDownloader, PopplerRenderer, Workspace};
use pdf2jpg_server::server::{
    metrics, run_server, shutdown_signal, RequestsLoggingLevel, ServerConfig,
};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The address to bind to.
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Directory holding the per-request session directories.
    #[clap(long, value_parser = parse_path, default_value = "temp")]
    pub temp_dir: PathBuf,

    /// Largest accepted upload, in megabytes.
    #[clap(long, default_value_t = 100)]
    pub max_upload_mb: u64,

    /// Conversions allowed to run at the same time. Further requests wait.
    #[clap(long, default_value_t = 2)]
    pub max_concurrent_conversions: usize,

    /// Rendering resolution.
    #[clap(long, default_value_t = 200)]
    pub dpi: u32,

    /// JPEG quality, 1 to 100.
    #[clap(long, default_value_t = 85)]
    pub jpeg_quality: u8,

    /// Number of pdftoppm processes per conversion.
    #[clap(long, default_value_t = 2)]
    pub render_threads: usize,

    /// Timeout in seconds for rendering a whole document.
    #[clap(long, default_value_t = 300)]
    pub render_timeout_sec: u64,

    /// Directory containing pdftoppm and pdfinfo. Defaults to PATH lookup.
    #[clap(long, value_parser = parse_path)]
    pub poppler_path: Option<PathBuf>,

    /// Timeout in seconds for pdf_url downloads.
    #[clap(long, default_value_t = 60)]
    pub download_timeout_sec: u64,

    /// Largest accepted pdf_url download, in megabytes.
    #[clap(long, default_value_t = 200)]
    pub download_max_mb: u64,

    /// Minutes between sweeps of orphaned session directories.
    #[clap(long, default_value_t = 15)]
    pub cleanup_interval_minutes: u64,

    /// Session directories younger than this many minutes are never swept.
    #[clap(long, default_value_t = 60)]
    pub cleanup_min_age_minutes: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            host: args.host.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            temp_dir: args.temp_dir.clone(),
            max_upload_mb: args.max_upload_mb,
            max_concurrent_conversions: args.max_concurrent_conversions,
            dpi: args.dpi,
            jpeg_quality: args.jpeg_quality,
            render_threads: args.render_threads,
            render_timeout_secs: args.render_timeout_sec,
            poppler_path: args.poppler_path.clone(),
            download_timeout_secs: args.download_timeout_sec,
            download_max_mb: args.download_max_mb,
            cleanup_interval_minutes: args.cleanup_interval_minutes,
            cleanup_min_age_minutes: args.cleanup_min_age_minutes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    info!(
        "Starting pdf2jpg-server {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  bind: {}", app_config.bind_address());
    info!("  temp_dir: {:?}", app_config.temp_dir);
    info!(
        "  conversion: {} dpi, quality {}, {} render threads, {} concurrent",
        app_config.conversion.dpi,
        app_config.conversion.jpeg_quality,
        app_config.conversion.render_threads,
        app_config.max_concurrent_conversions
    );

    info!("Initializing metrics...");
    metrics::init_metrics();

    let workspace = Workspace::new(&app_config.temp_dir);
    workspace
        .init()
        .await
        .with_context(|| format!("Failed to create temp dir {:?}", app_config.temp_dir))?;

    let renderer = PopplerRenderer::new(app_config.conversion.clone());
    match renderer.check_available().await {
        Ok(()) => info!("Poppler tools available"),
        Err(e) => warn!("Poppler tools not usable, conversions will fail: {}", e),
    }

    let downloader =
        PdfDownloader::new(&app_config.download).context("Failed to build HTTP client")?;
    let converter = Arc::new(PdfConverter::new(
        workspace,
        downloader,
        Arc::new(renderer),
        app_config.max_concurrent_conversions,
    ));

    let shutdown_token = CancellationToken::new();

    let sweeper = TempSweeper::new(&app_config.temp_dir, &app_config.cleanup);
    tokio::spawn(sweeper.run(shutdown_token.clone()));

    let signal = shutdown_signal().context("Failed to install signal handlers")?;
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        let name = signal.await;
        info!("Received {}, initiating graceful shutdown", name);
        signal_token.cancel();
    });

    // Requests still queued for a conversion slot get 503 once shutdown starts
    let closing_converter = converter.clone();
    let closing_token = shutdown_token.clone();
    tokio::spawn(async move {
        closing_token.cancelled().await;
        closing_converter.close();
    });

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at {}!", app_config.metrics_bind_address());

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        max_upload_bytes: app_config.max_upload_bytes,
    };
    let result = run_server(
        server_config,
        &app_config.host,
        app_config.metrics_port,
        converter,
        shutdown_token.clone(),
    )
    .await;

    info!("HTTP server stopped: {:?}", result);
    shutdown_token.cancel();
    result
}
