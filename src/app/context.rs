//! 应用上下文（DI 容器）
//!
//! 统一持有跨模块共享的服务实例，由进程入口构建并持有，
//! 测试中可以通过 `assemble` 注入替身存储与邮件发送器。

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{CredentialGate, TokenCodec, VerificationCodeManager};
use crate::cache::{SessionStore, build_store};
use crate::config::AppConfig;
use crate::email::{EmailSender, build_sender};
use crate::error::Result;
use crate::limits::{GuestThrottle, QuotaGovernor, RateLimiter};
use crate::repository::{CredentialRepository, SeaOrmCredentialRepository};
use crate::{linfo, logging::{LogComponent, LogStage}};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub store: Arc<dyn SessionStore>,
    pub repo: Arc<dyn CredentialRepository>,
    pub gate: Arc<CredentialGate>,
    pub verification: Arc<VerificationCodeManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub guest: Arc<GuestThrottle>,
    pub quota: Arc<QuotaGovernor>,
}

impl AppContext {
    /// 按配置初始化数据库、会话存储与邮件发送器并组装全部服务
    pub async fn build(config: AppConfig) -> Result<Self> {
        let db = crate::database::init_database(&config.database).await?;
        let store = build_store(&config.cache).await?;
        let sender = build_sender(&config.email)?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "context_ready",
            &format!("依赖初始化完成: store={}, email={:?}", store.backend(), config.email.provider)
        );
        Self::assemble(config, db, store, sender)
    }

    /// 以给定的底层依赖组装服务
    ///
    /// 签名密钥不合法时返回配置错误
    pub fn assemble(
        config: AppConfig,
        db: DatabaseConnection,
        store: Arc<dyn SessionStore>,
        sender: Arc<dyn EmailSender>,
    ) -> Result<Self> {
        let codec = Arc::new(TokenCodec::new(&config.jwt)?);
        let repo: Arc<dyn CredentialRepository> =
            Arc::new(SeaOrmCredentialRepository::new(db.clone()));

        let verification = Arc::new(VerificationCodeManager::new(
            store.clone(),
            sender,
            config.verification.clone(),
        ));
        let gate = Arc::new(CredentialGate::new(
            repo.clone(),
            store.clone(),
            codec,
            verification.clone(),
            config.auth.clone(),
            &config.jwt,
        ));

        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let guest = Arc::new(GuestThrottle::new(store.clone(), config.guest.clone()));
        let quota = Arc::new(QuotaGovernor::new(repo.clone()));

        Ok(Self {
            config: Arc::new(config),
            db,
            store,
            repo,
            gate,
            verification,
            rate_limiter,
            guest,
            quota,
        })
    }
}
