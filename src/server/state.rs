use axum::extract::FromRef;

use crate::conversion::PdfConverter;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedConverter = Arc<PdfConverter>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub converter: GuardedConverter,
    pub hash: String,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
