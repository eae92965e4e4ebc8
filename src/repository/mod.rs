//! # 凭证仓库
//!
//! 认证核心通过 `CredentialRepository` 访问用户表，默认实现基于 Sea-ORM

mod credential;

pub use credential::SeaOrmCredentialRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::permissions::{UserRole, UserStatus};
use crate::error::{GateError, Result};

/// 用户凭证
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub token_quota: i64,
    pub token_used: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<entity::users::Model> for Credential {
    type Error = GateError;

    fn try_from(model: entity::users::Model) -> Result<Self> {
        let role = UserRole::parse(&model.role)
            .ok_or_else(|| GateError::database(format!("未知的用户角色: {}", model.role)))?;
        let status = UserStatus::parse(&model.status)
            .ok_or_else(|| GateError::database(format!("未知的用户状态: {}", model.status)))?;

        Ok(Self {
            id: model.id,
            email: model.email,
            phone: model.phone,
            password_hash: model.password_hash,
            name: model.name,
            role,
            status,
            token_quota: model.token_quota,
            token_used: model.token_used,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// 新建凭证所需字段
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub token_quota: i64,
}

/// 部分字段更新，`None` 表示不修改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub token_quota: Option<i64>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl CredentialUpdate {
    #[must_use]
    pub fn last_login(at: DateTime<Utc>) -> Self {
        Self {
            last_login_at: Some(at),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn password(hash: String) -> Self {
        Self {
            password_hash: Some(hash),
            ..Self::default()
        }
    }
}

/// 可自增的计数列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    TokenUsed,
    TokenQuota,
}

/// 额度快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub quota: i64,
    pub used: i64,
}

impl QuotaSnapshot {
    #[must_use]
    pub const fn remaining(&self) -> i64 {
        let left = self.quota - self.used;
        if left < 0 { 0 } else { left }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.used >= self.quota
    }
}

/// 条件扣减结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDeduction {
    /// 扣减成功，返回扣减后的额度
    Applied(QuotaSnapshot),
    /// 额度已用完，未扣减
    Exhausted,
}

/// 凭证仓库 trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Credential>>;

    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// 创建凭证，唯一约束冲突映射为 `EmailExists`
    async fn create(&self, new: NewCredential) -> Result<Credential>;

    /// 更新部分字段，用户不存在返回 `UserNotFound`
    async fn update_fields(&self, id: &str, update: CredentialUpdate) -> Result<()>;

    /// 无条件自增计数列
    async fn increment_field(&self, id: &str, counter: Counter, amount: i64) -> Result<()>;

    async fn get_quota(&self, id: &str) -> Result<QuotaSnapshot>;

    /// 仅当 `token_used < token_quota` 时原子扣减
    async fn consume_quota(&self, id: &str, amount: i64) -> Result<QuotaDeduction>;
}
