mod filesystem;
mod memory;
mod object;
mod redis_store;

// Backends for the two storage capabilities
pub use filesystem::FilesystemUserStorage;
pub use memory::{MemoryStorage, SweepHandle};
pub use object::{ObjectStoreUserStorage, S3Settings, USERS_PREFIX};
pub use redis_store::RedisSessionStorage;
