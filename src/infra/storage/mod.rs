//! Session storage backends for the diagram cache.

mod file;
mod lock;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;
