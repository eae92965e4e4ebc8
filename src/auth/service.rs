//! # 认证服务
//!
//! 注册、登录、刷新令牌轮换、注销与登录失败锁定，
//! 以及用户自助修改资料、密码和管理员维护账户状态与角色

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::auth::jwt::{TokenCodec, TokenPair, hash_refresh_token};
use crate::auth::password::{PasswordVault, validate_strength};
use crate::auth::permissions::{UserRole, UserStatus};
use crate::auth::types::{Identity, RefreshRecord};
use crate::auth::verification::{VerificationCodeManager, VerificationPurpose};
use crate::cache::{CacheKey, SessionStore};
use crate::config::{AuthConfig, JwtConfig};
use crate::error::{Context, GateError, Result};
use crate::logging::mask_email;
use crate::repository::{Credential, CredentialRepository, CredentialUpdate, NewCredential};
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

/// 注册输入
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

/// 登录结果
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: Credential,
    pub token: TokenPair,
}

/// 邮箱统一去空白并转小写
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 认证服务
pub struct CredentialGate {
    repo: Arc<dyn CredentialRepository>,
    store: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
    vault: PasswordVault,
    verification: Arc<VerificationCodeManager>,
    auth: AuthConfig,
    refresh_ttl: Duration,
}

impl CredentialGate {
    #[must_use]
    pub fn new(
        repo: Arc<dyn CredentialRepository>,
        store: Arc<dyn SessionStore>,
        codec: Arc<TokenCodec>,
        verification: Arc<VerificationCodeManager>,
        auth: AuthConfig,
        jwt: &JwtConfig,
    ) -> Self {
        Self {
            repo,
            store,
            codec,
            vault: PasswordVault::new(auth.bcrypt_cost),
            verification,
            auth,
            refresh_ttl: jwt.refresh_ttl(),
        }
    }

    /// 令牌编解码器
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// 注册新用户
    ///
    /// 预检查之外，唯一约束冲突同样映射为 `EmailExists`。
    pub async fn register(&self, account: NewAccount) -> Result<Credential> {
        let email = normalize_email(&account.email);
        if self.repo.exists_by_email(&email).await? {
            return Err(GateError::EmailExists);
        }

        validate_strength(&account.password)?;
        let password_hash = self.vault.hash_password(&account.password).await?;

        let user = self
            .repo
            .create(NewCredential {
                email,
                phone: account.phone.filter(|p| !p.trim().is_empty()),
                password_hash,
                name: account.name.trim().to_string(),
                role: UserRole::User,
                status: UserStatus::Active,
                token_quota: self.auth.default_token_quota,
            })
            .await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::CredentialGate,
            "register",
            &format!("新用户注册: id={}, email={}", user.id, mask_email(&user.email))
        );
        Ok(user)
    }

    /// 校验注册验证码后注册
    pub async fn register_with_code(&self, account: NewAccount, code: &str) -> Result<Credential> {
        let email = normalize_email(&account.email);
        if self.repo.exists_by_email(&email).await? {
            return Err(GateError::EmailExists);
        }
        validate_strength(&account.password)?;
        self.verification
            .verify_code(&email, code, VerificationPurpose::Register)
            .await?;
        self.register(account).await
    }

    /// 邮箱密码登录
    pub async fn login_by_email(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);
        let attempts_key = CacheKey::LoginAttempts { email: email.clone() }.build();

        if self.store.get_counter(&attempts_key).await? >= self.auth.max_login_attempts {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::CredentialGate,
                "account_locked",
                &format!("账户已锁定: {}", mask_email(&email))
            );
            return Err(GateError::AccountLocked);
        }

        let found = self.repo.find_by_email(&email).await?;
        let verified = match &found {
            Some(user) => self.vault.verify_password(password, &user.password_hash).await,
            None => false,
        };

        let user = match found {
            Some(user) if verified => user,
            _ => {
                self.store
                    .incr_with_ttl(&attempts_key, Duration::from_secs(self.auth.lockout_duration))
                    .await?;
                lwarn!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::CredentialGate,
                    "login_failed",
                    &format!("登录失败: {}", mask_email(&email))
                );
                return Err(GateError::InvalidCredentials);
            }
        };

        if !user.status.is_active() {
            return Err(GateError::AccountDisabled);
        }

        self.store.delete(&[&attempts_key]).await?;
        self.complete_login(user).await
    }

    /// 手机号 + 验证码登录
    ///
    /// 验证码发送到账户绑定的邮箱，用途为 `login`。
    pub async fn login_by_phone(&self, phone: &str, code: &str) -> Result<LoginOutcome> {
        let user = self
            .repo
            .find_by_phone(phone.trim())
            .await?
            .ok_or(GateError::InvalidCredentials)?;

        self.verification
            .verify_code(&user.email, code, VerificationPurpose::Login)
            .await?;

        if !user.status.is_active() {
            return Err(GateError::AccountDisabled);
        }

        self.complete_login(user).await
    }

    async fn complete_login(&self, mut user: Credential) -> Result<LoginOutcome> {
        let now = Utc::now();
        self.repo
            .update_fields(&user.id, CredentialUpdate::last_login(now))
            .await?;
        user.last_login_at = Some(now);

        let token = self.issue_token_pair(&user.id, user.role).await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::CredentialGate,
            "login",
            &format!("用户登录成功: id={}", user.id)
        );
        Ok(LoginOutcome { user, token })
    }

    /// 刷新令牌轮换：旧令牌在签发新令牌前被原子删除
    pub async fn refresh_token(&self, raw: &str) -> Result<TokenPair> {
        if raw.is_empty() {
            return Err(GateError::RefreshTokenInvalid);
        }

        let key = CacheKey::RefreshToken { token_hash: hash_refresh_token(raw) }.build();
        let record: RefreshRecord = match self.store.take(&key).await? {
            Some(raw_record) => serde_json::from_str(&raw_record)
                .map_err(|_| GateError::RefreshTokenInvalid)?,
            None => return Err(GateError::RefreshTokenInvalid),
        };

        let user = self
            .repo
            .find_by_id(&record.user_id)
            .await?
            .ok_or(GateError::RefreshTokenInvalid)?;
        if !user.status.is_active() {
            return Err(GateError::AccountDisabled);
        }

        self.issue_token_pair(&user.id, user.role).await
    }

    /// 注销访问令牌
    ///
    /// 已过期但签名有效的令牌同样可以注销；签名无效的令牌直接拒绝。
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let claims = self
            .codec
            .get_token_id(access_token)
            .map_err(|_| GateError::TokenInvalid)?;

        let ttl = Duration::from_secs(claims.remaining_secs()).max(self.refresh_ttl);
        let key = CacheKey::Blacklist { jti: claims.jti.clone() }.build();
        self.store.set(&key, "1", Some(ttl)).await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::CredentialGate,
            "logout",
            &format!("用户注销: id={}", claims.uid)
        );
        Ok(())
    }

    /// 获取当前用户
    pub async fn get_current_user(&self, user_id: &str) -> Result<Credential> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or(GateError::UserNotFound)
    }

    /// 通过邮箱验证码重置密码
    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        let email = normalize_email(email);
        self.verification
            .verify_code(&email, code, VerificationPurpose::ResetPassword)
            .await?;
        validate_strength(new_password)?;

        let user = self
            .repo
            .find_by_email(&email)
            .await?
            .ok_or(GateError::UserNotFound)?;

        let hash = self.vault.hash_password(new_password).await?;
        self.repo
            .update_fields(&user.id, CredentialUpdate::password(hash))
            .await?;

        let attempts_key = CacheKey::LoginAttempts { email }.build();
        self.store.delete(&[&attempts_key]).await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::CredentialGate,
            "reset_password",
            &format!("密码已重置: id={}", user.id)
        );
        Ok(())
    }

    /// 修改密码，需要校验旧密码
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.get_current_user(user_id).await?;
        if !self.vault.verify_password(old_password, &user.password_hash).await {
            return Err(GateError::invalid_param("旧密码错误"));
        }
        validate_strength(new_password)?;

        let hash = self.vault.hash_password(new_password).await?;
        self.repo
            .update_fields(&user.id, CredentialUpdate::password(hash))
            .await
            .context("修改密码失败")?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::CredentialGate,
            "change_password",
            &format!("密码已修改: id={}", user.id)
        );
        Ok(())
    }

    /// 更新个人资料并返回最新信息
    pub async fn update_profile(&self, user_id: &str, name: &str) -> Result<Credential> {
        let update = CredentialUpdate {
            name: Some(name.trim().to_string()),
            ..CredentialUpdate::default()
        };
        self.repo
            .update_fields(user_id, update)
            .await
            .context("更新资料失败")?;
        self.get_current_user(user_id).await
    }

    /// 管理员修改账户状态，不能修改自己
    ///
    /// 停用后刷新令牌立即失效，已签发的访问令牌在到期前仍然有效。
    pub async fn update_status(
        &self,
        actor: &Identity,
        user_id: &str,
        status: UserStatus,
    ) -> Result<Credential> {
        if actor.user_id == user_id {
            return Err(GateError::invalid_param("不能修改自己的状态"));
        }

        let update = CredentialUpdate {
            status: Some(status),
            ..CredentialUpdate::default()
        };
        self.repo
            .update_fields(user_id, update)
            .await
            .with_context(|| format!("更新用户状态失败: id={user_id}"))?;

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::CredentialGate,
            "update_status",
            &format!("账户状态已修改: id={user_id}, status={status}, by={}", actor.user_id)
        );
        self.get_current_user(user_id).await
    }

    /// 修改用户角色，仅超级管理员可用，不能修改自己
    pub async fn update_role(
        &self,
        actor: &Identity,
        user_id: &str,
        role: UserRole,
    ) -> Result<Credential> {
        if actor.user_id == user_id {
            return Err(GateError::invalid_param("不能修改自己的角色"));
        }
        if actor.role != UserRole::SuperAdmin {
            return Err(GateError::forbidden("只有超级管理员才能修改角色"));
        }

        let update = CredentialUpdate {
            role: Some(role),
            ..CredentialUpdate::default()
        };
        self.repo
            .update_fields(user_id, update)
            .await
            .with_context(|| format!("更新用户角色失败: id={user_id}"))?;

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::CredentialGate,
            "update_role",
            &format!("用户角色已修改: id={user_id}, role={role}, by={}", actor.user_id)
        );
        self.get_current_user(user_id).await
    }

    /// 检查 jti 是否已注销
    pub async fn is_blacklisted(&self, jti: &str) -> Result<bool> {
        self.store
            .exists(&CacheKey::Blacklist { jti: jti.to_string() }.build())
            .await
    }

    /// 校验访问令牌并返回请求身份
    pub async fn authenticate(&self, token: &str) -> Result<Identity> {
        let claims = self.codec.parse_token(token)?;
        if self.is_blacklisted(&claims.jti).await? {
            return Err(GateError::TokenRevoked);
        }
        Ok(Identity::from_claims(claims))
    }

    /// 签发令牌对，刷新令牌只以哈希形式保存
    async fn issue_token_pair(&self, user_id: &str, role: UserRole) -> Result<TokenPair> {
        let access_token = self.codec.generate_access_token(user_id, role)?;
        let refresh_token = self.codec.generate_refresh_token();

        let record = RefreshRecord {
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        let key = CacheKey::RefreshToken { token_hash: hash_refresh_token(&refresh_token) }.build();
        self.store
            .set_json(&key, &record, Some(self.refresh_ttl))
            .await?;

        Ok(TokenPair::bearer(
            access_token,
            refresh_token,
            self.codec.access_expire(),
        ))
    }
}
