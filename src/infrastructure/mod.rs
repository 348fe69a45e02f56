pub mod in_memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;
