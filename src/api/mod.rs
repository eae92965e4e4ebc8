//! # HTTP 接口
//!
//! 认证、对话用量与管理员接口，统一使用 `{code, message, data}` 响应信封

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use routes::{API_PREFIX, create_routes};
pub use server::{AppState, build_router, serve};
