use crate::jobs::rollup::RollupRequest;
use crate::middleware::RateLimiter;
use crate::services::cache::CacheClient;
use crate::services::embeddings::Embeddings;
use crate::services::mailer::Mailer;
use crate::services::payments::GatewayClient;
use crate::services::storage::Storage;
use crate::services::transcriber::Transcriber;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<CacheClient>,
    pub storage: Arc<Storage>,
    pub transcriber: Arc<Transcriber>,
    pub mailer: Arc<Mailer>,
    pub gateway: Arc<GatewayClient>,
    pub embeddings: Arc<Embeddings>,
    pub session_key: Vec<u8>,
    pub webhook_secret: Vec<u8>,
    pub rollup_tx: UnboundedSender<RollupRequest>,
    pub login_limiter: RateLimiter,
    pub submit_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
