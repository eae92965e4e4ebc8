//! # 测试支撑
//!
//! 测试配置、临时数据库上下文、数据 fixtures 与邮件替身

pub mod fixtures;
pub mod helpers;
pub mod mocks;

pub use fixtures::{CredentialFixture, DEFAULT_PASSWORD};
pub use helpers::{TEST_JWT_SECRET, TestContext, init_test_env, test_config};
pub use mocks::{RecordingEmailSender, SentEmail};
