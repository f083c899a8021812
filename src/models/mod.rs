mod blob;
mod document;
mod file_slot;
mod refresh_token;
mod user;

pub use blob::Blob;
pub use document::{NewPulpDocument, PulpDocument};
pub use file_slot::{FileSlot, FileSlots};
pub use refresh_token::RefreshToken;
pub use user::User;
