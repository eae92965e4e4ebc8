//! # Entity 模块
//!
//! 包含凭证表的 Sea-ORM 实体定义

pub mod users;

pub use users::Entity as Users;

#[cfg(test)]
mod tests;
