pub mod duckdb;
pub mod traits;

pub use self::duckdb::DuckDbStorage;
pub use traits::{Storage, StorageError, StoredEvent};
