//! NoOverfit Database Crate
//!
//! SQLite-backed persistence for the conversation session: connection
//! management, migrations and the key-value session store.

pub mod connection;
pub mod migrations;
pub mod session_store;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::run_migrations;
pub use session_store::SqliteSessionStore;
