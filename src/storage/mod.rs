pub mod sqlite;
pub mod traits;

pub use sqlite::{SqliteStorage, SqliteTx};
pub use traits::{Storage, StorageTx};
