//! SQLite bootstrap for the key-value store.
//!
//! Opens connections, switches file databases to WAL and runs the
//! `kv_entries` migrations tracked in `PRAGMA user_version`. Failures
//! surface as [`StoreError`](crate::store::StoreError).

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
