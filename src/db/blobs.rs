use bytes::Bytes;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Blob;

pub async fn insert_header<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    filename: &str,
    content_type: &str,
    chunk_size: i32,
    uploaded_by: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO blobs (id, filename, content_type, chunk_size, uploaded_by)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(filename)
    .bind(content_type)
    .bind(chunk_size)
    .bind(uploaded_by)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_chunk<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    blob_id: Uuid,
    n: i32,
    data: &[u8],
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO blob_chunks (blob_id, n, data) VALUES ($1, $2, $3)")
        .bind(blob_id)
        .bind(n)
        .bind(data)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn finalize<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    length: i64,
    sha256: &str,
) -> Result<Blob, sqlx::Error> {
    sqlx::query_as::<_, Blob>(
        "UPDATE blobs SET length = $2, sha256 = $3 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(length)
    .bind(sha256)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Blob>, sqlx::Error> {
    sqlx::query_as::<_, Blob>("SELECT * FROM blobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Blob>, sqlx::Error> {
    sqlx::query_as::<_, Blob>("SELECT * FROM blobs WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn fetch_chunk(pool: &PgPool, blob_id: Uuid, n: i32) -> Result<Option<Bytes>, sqlx::Error> {
    let row: Option<(Vec<u8>,)> =
        sqlx::query_as("SELECT data FROM blob_chunks WHERE blob_id = $1 AND n = $2")
            .bind(blob_id)
            .bind(n)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(data,)| Bytes::from(data)))
}

/// Cheap probe used at startup to confirm both tables are reachable.
pub async fn probe(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1 FROM blobs LIMIT 1").execute(pool).await?;
    sqlx::query("SELECT 1 FROM blob_chunks LIMIT 1").execute(pool).await?;
    Ok(())
}
