//! # HTTP 处理器

pub mod admin;
pub mod auth;
pub mod chat;
pub mod health;
pub mod users;
