//! # 邮件模块
//!
//! 与服务商无关的发送接口，以及日志和 Resend 两种实现

mod sender;
pub mod templates;

pub use sender::{LogEmailSender, ResendEmailSender};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmailConfig, EmailProvider};
use crate::error::Result;

/// 邮件发送接口
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// 根据配置创建发送器
pub fn build_sender(config: &EmailConfig) -> Result<Arc<dyn EmailSender>> {
    match config.provider {
        EmailProvider::Log => Ok(Arc::new(LogEmailSender)),
        EmailProvider::Resend => Ok(Arc::new(ResendEmailSender::new(config)?)),
    }
}
