//! 邮件发送实现

use async_trait::async_trait;
use serde::Serialize;

use super::EmailSender;
use crate::config::EmailConfig;
use crate::error::{GateError, Result};
use crate::logging::mask_email;
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

/// 只写日志的发送器，开发环境使用
///
/// 不记录邮件正文，验证码不会出现在日志中。
#[derive(Debug, Default, Clone)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<()> {
        linfo!(
            "system",
            LogStage::Verification,
            LogComponent::Email,
            "log_send",
            &format!("邮件已记录: to={}, subject={subject}", mask_email(to))
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Resend HTTP API 发送器
#[derive(Clone)]
pub struct ResendEmailSender {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    from: String,
}

impl ResendEmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let api_key = config
            .resend_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GateError::config("缺少 resend_api_key"))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| GateError::config_with_source("创建 HTTP 客户端失败", e))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/emails", config.resend_base_url.trim_end_matches('/')),
            from: format!("{} <{}>", config.from_name, config.from_address),
        })
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let body = ResendRequest {
            from: self.from.clone(),
            to: [to],
            subject,
            html: html_body,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            lwarn!(
                "system",
                LogStage::Verification,
                LogComponent::Email,
                "resend_failed",
                &format!("Resend 返回 {status}: {detail}")
            );
            return Err(GateError::email(format!("Resend 返回状态码 {status}")));
        }

        linfo!(
            "system",
            LogStage::Verification,
            LogComponent::Email,
            "resend_sent",
            &format!("邮件已发送: to={}", mask_email(to))
        );
        Ok(())
    }
}
