use std::sync::Arc;

use sqlx::PgPool;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::error::AppError;
use crate::rate_limit::LoginRateLimiter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// `None` when the blob store failed to open at startup.
    pub blobs: Option<BlobStore>,
    pub login_limiter: LoginRateLimiter,
}

impl AppState {
    pub fn blobs(&self) -> Result<&BlobStore, AppError> {
        self.blobs.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("File storage is not initialized".to_string())
        })
    }
}
