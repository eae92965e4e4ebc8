//! # 测试数据 Fixtures

use crate::auth::{PasswordVault, UserRole, UserStatus};
use crate::error::Result;
use crate::repository::{Credential, CredentialRepository, NewCredential};

/// 符合强度要求的默认密码
pub const DEFAULT_PASSWORD: &str = "Passw0rd!";

/// 用户测试数据构建器
#[derive(Debug, Clone)]
pub struct CredentialFixture {
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub token_quota: i64,
}

impl Default for CredentialFixture {
    fn default() -> Self {
        Self {
            email: "test@example.com".to_string(),
            phone: None,
            password: DEFAULT_PASSWORD.to_string(),
            name: "Test User".to_string(),
            role: UserRole::User,
            status: UserStatus::Active,
            token_quota: 100_000,
        }
    }
}

impl CredentialFixture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    #[must_use]
    pub fn phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    #[must_use]
    pub const fn role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub const fn status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub const fn quota(mut self, quota: i64) -> Self {
        self.token_quota = quota;
        self
    }

    /// 以最低 bcrypt 成本哈希密码后写入仓库
    pub async fn insert(self, repo: &dyn CredentialRepository) -> Result<Credential> {
        let password_hash = PasswordVault::new(4).hash_password(&self.password).await?;
        repo.create(NewCredential {
            email: self.email,
            phone: self.phone,
            password_hash,
            name: self.name,
            role: self.role,
            status: self.status,
            token_quota: self.token_quota,
        })
        .await
    }
}
