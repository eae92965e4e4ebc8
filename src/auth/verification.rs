//! # 验证码管理
//!
//! 一次性邮箱验证码的签发与校验。每个 (用途, 邮箱) 同时只有一个有效验证码，
//! 校验成功即失效。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::OsRng;

use crate::cache::{CacheKey, SessionStore};
use crate::config::VerificationConfig;
use crate::email::{EmailSender, templates};
use crate::error::{GateError, Result};
use crate::logging::mask_email;
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

/// 验证码用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationPurpose {
    Register,
    ResetPassword,
    Login,
}

impl VerificationPurpose {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ResetPassword => "reset_password",
            Self::Login => "login",
        }
    }

    /// 解析用途，未知用途返回参数错误
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "register" => Ok(Self::Register),
            "reset_password" => Ok(Self::ResetPassword),
            "login" => Ok(Self::Login),
            other => Err(GateError::invalid_param(format!("不支持的验证码用途: {other}"))),
        }
    }

    /// 邮件主题
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::Register => "LexVeritas - 注册验证码",
            Self::ResetPassword => "LexVeritas - 重置密码验证码",
            Self::Login => "LexVeritas - 登录验证码",
        }
    }
}

impl fmt::Display for VerificationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 验证码管理器
pub struct VerificationCodeManager {
    store: Arc<dyn SessionStore>,
    sender: Arc<dyn EmailSender>,
    config: VerificationConfig,
}

impl VerificationCodeManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        sender: Arc<dyn EmailSender>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.config.code_expire)
    }

    /// 发送验证码
    pub async fn send_code(&self, email: &str, purpose: VerificationPurpose) -> Result<()> {
        let limit_key = CacheKey::VerifyCooldown { email: email.to_string() }.build();
        if self.store.exists(&limit_key).await? {
            return Err(GateError::CodeSendTooFrequent);
        }

        let code = generate_code(self.config.code_length);
        let code_key = CacheKey::VerifyCode {
            purpose: purpose.as_str().to_string(),
            email: email.to_string(),
        }
        .build();
        self.store.set(&code_key, &code, Some(self.code_ttl())).await?;

        // 冷却标记写入失败不影响发送
        if let Err(e) = self
            .store
            .set(&limit_key, "1", Some(Duration::from_secs(self.config.resend_delay)))
            .await
        {
            lwarn!(
                "system",
                LogStage::Verification,
                LogComponent::Verification,
                "set_cooldown_failed",
                &format!("设置发送频率限制失败: {e}")
            );
        }

        let html = templates::verification_code_html(&code, self.config.code_expire / 60);
        if let Err(e) = self.sender.send(email, purpose.subject(), &html).await {
            // 发送失败时删除验证码与冷却标记，允许立即重试
            if let Err(cleanup) = self.store.delete(&[&code_key, &limit_key]).await {
                lwarn!(
                    "system",
                    LogStage::Verification,
                    LogComponent::Verification,
                    "cleanup_failed",
                    &format!("清理验证码失败: {cleanup}")
                );
            }
            return Err(match e {
                GateError::Email { .. } => e,
                other => GateError::email_with_source("发送邮件失败", other),
            });
        }

        linfo!(
            "system",
            LogStage::Verification,
            LogComponent::Verification,
            "code_sent",
            &format!("验证码已发送: email={}, purpose={purpose}", mask_email(email))
        );
        Ok(())
    }

    /// 校验验证码，成功后验证码与尝试计数一并删除
    pub async fn verify_code(
        &self,
        email: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<()> {
        let attempts_key = CacheKey::VerifyAttempts { email: email.to_string() }.build();
        if self.store.get_counter(&attempts_key).await? >= self.config.max_attempts {
            return Err(GateError::TooManyAttempts);
        }

        let code_key = CacheKey::VerifyCode {
            purpose: purpose.as_str().to_string(),
            email: email.to_string(),
        }
        .build();

        let Some(stored) = self.store.get(&code_key).await? else {
            self.store.incr_with_ttl(&attempts_key, self.code_ttl()).await?;
            return Err(GateError::CodeExpired);
        };

        if !constant_time_eq(stored.as_bytes(), code.trim().as_bytes()) {
            self.store.incr_with_ttl(&attempts_key, self.code_ttl()).await?;
            return Err(GateError::CodeInvalid);
        }

        // 并发校验同一验证码时只有删除成功的一方生效
        if self.store.delete(&[&code_key]).await? == 0 {
            return Err(GateError::CodeExpired);
        }
        self.store.delete(&[&attempts_key]).await?;

        linfo!(
            "system",
            LogStage::Verification,
            LogComponent::Verification,
            "code_verified",
            &format!("验证码校验成功: email={}, purpose={purpose}", mask_email(email))
        );
        Ok(())
    }
}

/// 生成随机数字验证码
fn generate_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10_u8)))
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
