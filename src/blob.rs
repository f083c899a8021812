//! Chunked file store on top of PostgreSQL.
//!
//! Every upload becomes one `blobs` header row plus `ceil(length / chunk_size)`
//! rows in `blob_chunks`, written inside a single transaction so a failed
//! upload leaves nothing behind. Downloads read the chunks back one at a time,
//! so memory use is bounded by the chunk size regardless of file size.

use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::Blob;

#[derive(Debug)]
pub enum BlobError {
    /// The incoming byte stream failed (client disconnect, malformed multipart).
    Source(String),
    TooLarge(usize),
    Database(sqlx::Error),
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobError::Source(msg) => write!(f, "Upload stream error: {msg}"),
            BlobError::TooLarge(limit) => write!(f, "File exceeds the {limit} byte limit"),
            BlobError::Database(err) => write!(f, "Blob store error: {err}"),
        }
    }
}

impl std::error::Error for BlobError {}

impl From<sqlx::Error> for BlobError {
    fn from(err: sqlx::Error) -> Self {
        BlobError::Database(err)
    }
}

pub struct NewBlob<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub uploaded_by: Uuid,
}

#[derive(Clone)]
pub struct BlobStore {
    pool: PgPool,
    chunk_size: usize,
    max_size: usize,
}

impl BlobStore {
    /// Open the store, failing if its tables are unreachable.
    pub async fn open(pool: PgPool, chunk_size: usize, max_size: usize) -> Result<Self, sqlx::Error> {
        db::blobs::probe(&pool).await?;
        Ok(Self {
            pool,
            chunk_size: chunk_size.max(1),
            max_size,
        })
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Blob>, sqlx::Error> {
        db::blobs::find_by_id(&self.pool, id).await
    }

    pub async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Blob>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        db::blobs::find_many(&self.pool, ids).await
    }

    /// Store everything `source` yields under a freshly generated id.
    pub async fn upload_from_stream<S, E>(
        &self,
        meta: NewBlob<'_>,
        source: S,
    ) -> Result<Blob, BlobError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BlobError>,
    {
        let id = Uuid::now_v7();
        let chunk_size = self.chunk_size;
        let chunk_size_col =
            i32::try_from(chunk_size).map_err(|_| BlobError::Source("chunk size too large".to_string()))?;

        let mut tx = self.pool.begin().await?;
        db::blobs::insert_header(
            &mut *tx,
            id,
            meta.filename,
            meta.content_type,
            chunk_size_col,
            meta.uploaded_by,
        )
        .await?;

        let mut hasher = Sha256::new();
        let mut buffer = BytesMut::with_capacity(chunk_size);
        let mut length: usize = 0;
        let mut n: i32 = 0;

        let mut source = std::pin::pin!(source);
        while let Some(piece) = source.next().await {
            let piece = piece.map_err(Into::<BlobError>::into)?;
            length += piece.len();
            if length > self.max_size {
                return Err(BlobError::TooLarge(self.max_size));
            }
            hasher.update(&piece);
            buffer.extend_from_slice(&piece);

            while buffer.len() >= chunk_size {
                let chunk = buffer.split_to(chunk_size);
                db::blobs::insert_chunk(&mut *tx, id, n, &chunk).await?;
                n += 1;
            }
        }

        if !buffer.is_empty() {
            db::blobs::insert_chunk(&mut *tx, id, n, &buffer).await?;
        }

        let digest = format!("{:x}", hasher.finalize());
        let blob = db::blobs::finalize(&mut *tx, id, length as i64, &digest).await?;
        tx.commit().await?;

        Ok(blob)
    }

    /// Stream a blob's content back in chunk order.
    ///
    /// A missing chunk ends the stream with an error rather than silently
    /// truncating the file.
    pub fn download_stream(&self, blob: &Blob) -> BoxStream<'static, Result<Bytes, BlobError>> {
        let pool = self.pool.clone();
        let blob_id = blob.id;
        let total = blob.chunk_count();

        futures_util::stream::try_unfold(0i64, move |n| {
            let pool = pool.clone();
            async move {
                if n >= total {
                    return Ok::<_, BlobError>(None);
                }
                let index = i32::try_from(n)
                    .map_err(|_| BlobError::Source(format!("chunk index {n} out of range")))?;
                match db::blobs::fetch_chunk(&pool, blob_id, index).await? {
                    Some(data) => Ok(Some((data, n + 1))),
                    None => {
                        tracing::error!(%blob_id, chunk = n, "Blob chunk missing");
                        Err(BlobError::Source(format!("chunk {n} of blob {blob_id} is missing")))
                    }
                }
            }
        })
        .boxed()
    }
}
