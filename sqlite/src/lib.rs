//! SQLite storage for tether.
//!
//! ```ignore
//! use tether_sqlite::SqliteStorage;
//! use tether_core::Db;
//!
//! let storage = SqliteStorage::open_in_memory()?;
//! storage.execute_batch("CREATE TABLE dogs (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")?;
//! let db = Db::new(storage);
//! ```

pub mod error;
pub mod params;

#[cfg(feature = "rusqlite")]
pub mod storage;
#[cfg(feature = "rusqlite")]
pub mod values;

pub use error::SqliteError;
pub use params::expand_params;

#[cfg(feature = "rusqlite")]
pub use storage::SqliteStorage;
