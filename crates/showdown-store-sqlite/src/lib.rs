//! SQLite backend for the Showdown trivia store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. That single thread is also the
//! serialization point the engine relies on: every multi-step write runs
//! inside one `call` closure, in one transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
