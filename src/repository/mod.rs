pub mod state;

pub use state::{ConfigStore, JsonFileStore, MemoryStore};
