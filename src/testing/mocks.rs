//! # 测试替身
//!
//! 记录已发送邮件的发送器，测试中用于取回验证码。

use std::sync::Mutex;

use async_trait::async_trait;
use regex::Regex;

use crate::email::EmailSender;
use crate::error::{GateError, Result};

/// 一封已发送的邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// 记录邮件而不真正发送
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    fail: bool,
}

impl RecordingEmailSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次发送都失败的发送器
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// 最近一封发往 `to` 的邮件中的验证码
    #[must_use]
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        let re = Regex::new(r">(\d{4,10})</span>").ok()?;
        self.sent()
            .iter()
            .rev()
            .find(|mail| mail.to.eq_ignore_ascii_case(to))
            .and_then(|mail| re.captures(&mail.html_body))
            .map(|caps| caps[1].to_string())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        if self.fail {
            return Err(GateError::email("模拟发送失败"));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
        }
        Ok(())
    }
}
