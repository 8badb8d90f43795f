pub mod config;
mod convert_routes;
mod error;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use convert_routes::ARCHIVE_FILENAME;
pub use error::{ApiError, ErrorResponse};
pub use http_layers::*;
pub use server::{make_app, make_metrics_app, run_server, shutdown_signal};
