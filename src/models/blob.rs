use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Header row of a stored file. Content lives in `blob_chunks`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Blob {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub length: i64,
    pub chunk_size: i32,
    pub sha256: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Blob {
    pub fn chunk_count(&self) -> i64 {
        let size = i64::from(self.chunk_size.max(1));
        (self.length + size - 1) / size
    }
}
