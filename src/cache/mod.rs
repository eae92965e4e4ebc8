//! # 缓存模块
//!
//! 会话存储接口、内存/Redis 实现与键命名规范

pub mod keys;
pub mod store;

pub use keys::CacheKey;
pub use store::{MemoryStore, RedisStore, SessionStore, build_store};
