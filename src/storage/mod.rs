pub mod memory;
pub mod seed;
pub mod trait_def;

pub use memory::MemoryStorage;
pub use seed::load_demo_data;
pub use trait_def::{Storage, StorageError, StorageResult};
