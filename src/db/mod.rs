pub mod blobs;
pub mod documents;
pub mod refresh_tokens;
pub mod users;
