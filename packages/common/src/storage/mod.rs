mod error;
mod traits;

pub mod filesystem;
pub mod memory;

pub use error::StorageError;
pub use filesystem::FilesystemKvEngine;
pub use memory::MemoryKvEngine;
pub use traits::KeyValueEngine;
