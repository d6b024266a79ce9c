//! Local key-value persistence on SQLite.
//!
//! Everything the client keeps between sessions (per-user interaction
//! snapshots, per-user feed preferences, the auth session) is a JSON document
//! under a dotted key in a single `kv_store` table.

mod kv;
mod schema;
mod types;

pub use kv::{interactions_key, preferences_key, user_key, SESSION_KEY};
pub use schema::Database;
pub use types::DatabaseError;
