use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPulpDocument, PulpDocument};

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    doc: &NewPulpDocument,
) -> Result<PulpDocument, sqlx::Error> {
    sqlx::query_as::<_, PulpDocument>(
        "INSERT INTO pulp_documents (
            id, user_id,
            trade_name, commodities, species_names, quantity,
            supplier_country, production_country, wood_origin_country,
            geolocation_polygon, harvest_dates,
            supplier_details, producer_details, geolocation_owner_details,
            files
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(&doc.trade_name)
    .bind(&doc.commodities)
    .bind(&doc.species_names)
    .bind(doc.quantity)
    .bind(&doc.supplier_country)
    .bind(&doc.production_country)
    .bind(&doc.wood_origin_country)
    .bind(&doc.geolocation_polygon)
    .bind(&doc.harvest_dates)
    .bind(&doc.supplier_details)
    .bind(&doc.producer_details)
    .bind(&doc.geolocation_owner_details)
    .bind(Json(doc.file_slots()))
    .fetch_one(pool)
    .await
}

/// Newest first.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<PulpDocument>, sqlx::Error> {
    sqlx::query_as::<_, PulpDocument>(
        "SELECT * FROM pulp_documents
         WHERE user_id = $1
         ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id_scoped(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<PulpDocument>, sqlx::Error> {
    sqlx::query_as::<_, PulpDocument>(
        "SELECT * FROM pulp_documents WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
