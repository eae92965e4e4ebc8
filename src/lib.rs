//! # LexGate
//!
//! 认证、会话与访问控制核心：JWT 签发与校验、刷新令牌轮换、注销黑名单、
//! 登录失败锁定、匿名用户限制、用户额度控制、客户端限流与邮箱验证码。

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod limits;
pub mod logging;
pub mod repository;
pub mod testing;

// Re-export commonly used types
pub use app::AppContext;
pub use config::AppConfig;
pub use error::{GateError, Result};
