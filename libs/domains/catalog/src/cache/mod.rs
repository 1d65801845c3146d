mod redis_cache;
mod repository;

pub use redis_cache::RedisCache;
pub use repository::{DEFAULT_TTL, SearchCache, read_json, write_json};

#[cfg(test)]
pub use repository::MockSearchCache;
