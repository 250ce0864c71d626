pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::CalendarStore;
pub use types::{Action, CalendarOverview, Event, QueryResponse};
