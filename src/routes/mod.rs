pub mod auth;
pub mod documents;
pub mod files;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::envelope::Envelope;
use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Documents
        .route("/api/submit", post(documents::submit))
        .route("/api/documents", get(documents::list))
        .route("/api/documents/{id}", get(documents::get))
        .route("/api/documents/{id}/files", get(documents::files))
        // Files
        .route("/api/upload", post(files::upload))
        .route("/api/download/{file_id}", get(files::download))
}

pub async fn not_found() -> (StatusCode, Json<Envelope<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::failure("Route not found")),
    )
}
