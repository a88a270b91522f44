pub mod error;
pub mod flatten;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use flatten::flatten;
pub use memory::MemoryMirror;
pub use sqlite::SqliteMirror;
pub use traits::*;
