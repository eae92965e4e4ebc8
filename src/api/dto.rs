//! # 请求与响应 DTO
//!
//! 请求体统一使用 camelCase，经 `ValidJson` 解析后自动校验。

use std::sync::LazyLock;

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ensure_param;
use crate::auth::{UserRole, UserStatus};
use crate::error::{GateError, Result};
use crate::limits::QuotaAllowance;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").ok());

/// 邮箱格式校验
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE
        .as_ref()
        .is_some_and(|re| re.is_match(email.trim()))
}

/// 请求体校验
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn require(value: &str, field: &str) -> Result<()> {
    ensure_param!(!value.trim().is_empty(), "{} 不能为空", field);
    Ok(())
}

fn require_name(name: &str) -> Result<()> {
    let name_len = name.trim().chars().count();
    ensure_param!((2..=100).contains(&name_len), "name 长度必须在 2 到 100 之间");
    Ok(())
}

fn require_email(email: &str) -> Result<()> {
    ensure_param!(is_valid_email(email), "邮箱格式不正确");
    Ok(())
}

/// 解析 JSON 并执行 `Validate`，失败统一映射为参数错误
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| GateError::invalid_param(format!("请求参数错误: {}", e.body_text())))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<()> {
        require_email(&self.email)?;
        require(&self.password, "password")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneLoginRequest {
    pub phone: String,
    pub code: String,
}

impl Validate for PhoneLoginRequest {
    fn validate(&self) -> Result<()> {
        require(&self.phone, "phone")?;
        require(&self.code, "code")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    pub email: String,
    pub purpose: String,
}

impl Validate for SendCodeRequest {
    fn validate(&self) -> Result<()> {
        require_email(&self.email)?;
        require(&self.purpose, "purpose")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub code: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<()> {
        require_email(&self.email)?;
        require(&self.code, "code")?;
        ensure_param!(self.password.chars().count() >= 8, "password 长度至少为 8 位");
        require_name(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Result<()> {
        require(&self.refresh_token, "refreshToken")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<()> {
        require_email(&self.email)?;
        require(&self.code, "code")?;
        ensure_param!(self.new_password.chars().count() >= 8, "newPassword 长度至少为 8 位");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<()> {
        require(&self.old_password, "oldPassword")?;
        ensure_param!(self.new_password.chars().count() >= 8, "newPassword 长度至少为 8 位");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: String,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<()> {
        require_name(&self.name)
    }
}

/// 管理员设置额度
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustQuotaRequest {
    pub new_quota: i64,
}

impl Validate for AdjustQuotaRequest {
    fn validate(&self) -> Result<()> {
        ensure_param!(self.new_quota >= 0, "newQuota 不能为负数");
        Ok(())
    }
}

/// 管理员追加额度
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantQuotaRequest {
    pub amount: i64,
}

impl Validate for GrantQuotaRequest {
    fn validate(&self) -> Result<()> {
        ensure_param!(self.amount > 0, "amount 必须大于 0");
        Ok(())
    }
}

/// 状态与角色取值不合法时在反序列化阶段即被拒绝
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

impl Validate for UpdateStatusRequest {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

impl Validate for UpdateRoleRequest {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// 一次对话的用量上报
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    pub session_id: String,
    #[serde(default)]
    pub tokens: i64,
}

impl Validate for UsageRequest {
    fn validate(&self) -> Result<()> {
        require(&self.session_id, "sessionId")?;
        ensure_param!(self.tokens >= 0, "tokens 不能为负数");
        Ok(())
    }
}

/// 用量上报结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    /// `guest` 或 `user`
    pub identity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_count: Option<i64>,
    /// 匿名用户剩余对话次数或用户剩余额度，`None` 表示不受限
    pub remaining: Option<i64>,
}

impl UsageResponse {
    #[must_use]
    pub const fn guest(chat_count: i64, remaining: i64) -> Self {
        Self {
            identity: "guest",
            chat_count: Some(chat_count),
            remaining: Some(remaining),
        }
    }

    #[must_use]
    pub const fn user(allowance: QuotaAllowance) -> Self {
        Self {
            identity: "user",
            chat_count: None,
            remaining: allowance.remaining,
        }
    }
}
