pub mod postgres;
pub mod snapshot;

/// Re-export commonly used types from adapters
pub use postgres::{PostgresSnapshot, PostgresStore};
pub use snapshot::{Scoped, SnapshotStore, StoreSnapshot};
