mod kv;
mod nonce_state;

pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use nonce_state::{state_key, PersistentStateStore};
