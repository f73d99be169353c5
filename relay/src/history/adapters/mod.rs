mod in_memory;
mod sqlite;

pub use in_memory::InMemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;
