//! Memory store implementations for DomiClaw.

pub mod noop;
pub mod in_memory;
pub mod file_backend;

pub use noop::NoopMemory;
pub use in_memory::InMemoryStore;
pub use file_backend::FileMemory;
