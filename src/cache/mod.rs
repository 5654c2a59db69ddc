pub mod backend;
pub mod memory_backend;
pub mod redis_backend;

pub use backend::{KvBackend, WriteOp};
pub use memory_backend::MemoryKvBackend;
pub use redis_backend::RedisKvBackend;
