//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use super::DatabaseConfig;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 会话存储配置
    pub cache: CacheConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    /// 匿名用户限制
    pub guest: GuestConfig,
    pub rate_limit: RateLimitConfig,
    pub verification: VerificationConfig,
    pub email: EmailConfig,
    pub log: LogConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 单个请求超时时间（秒）
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: 30,
        }
    }
}

/// 缓存类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// 内存缓存（单实例）
    #[default]
    Memory,
    /// Redis缓存（多实例共享）
    Redis,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存类型
    pub cache_type: CacheType,
    /// 内存缓存最大条目数，写满且无过期项可回收时拒绝新键
    pub memory_max_entries: usize,
    /// 单次存储操作超时（毫秒）
    pub op_timeout_ms: u64,
    /// Redis 缓存配置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Memory,
            memory_max_entries: 100_000,
            op_timeout_ms: 2000,
            redis: None,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HS256 签名密钥，至少 32 字节
    pub secret: String,
    /// 访问令牌有效期（秒）
    pub access_expire: u64,
    /// 刷新令牌有效期（秒）
    pub refresh_expire: u64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_expire: 2 * 3600,
            refresh_expire: 7 * 24 * 3600,
            issuer: "lex-veritas".to_string(),
        }
    }
}

impl JwtConfig {
    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_expire)
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_expire)
    }
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    /// 锁定前允许的连续失败次数
    pub max_login_attempts: i64,
    /// 锁定窗口（秒）
    pub lockout_duration: u64,
    /// 新用户默认额度
    pub default_token_quota: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 12,
            max_login_attempts: 5,
            lockout_duration: 15 * 60,
            default_token_quota: 100_000,
        }
    }
}

/// 匿名用户配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestConfig {
    pub enabled: bool,
    pub max_chats_per_session: i64,
    /// 匿名会话有效期（秒），同时作为 Cookie 的 Max-Age
    pub session_ttl: u64,
    pub cookie_name: String,
    /// 仅在 HTTPS 部署下开启
    pub cookie_secure: bool,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chats_per_session: 5,
            session_ttl: 24 * 3600,
            cookie_name: "lex_guest_id".to_string(),
            cookie_secure: false,
        }
    }
}

/// 限流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// 每秒补充的令牌数
    pub rate: u32,
    /// 桶容量
    pub burst: u32,
    /// 同时跟踪的客户端上限
    pub max_tracked_clients: usize,
    /// 空闲多久（秒）后回收客户端桶
    pub idle_ttl: u64,
    /// 受信任的反向代理地址，只有来自这些地址的请求才读取转发头
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 10,
            burst: 20,
            max_tracked_clients: 10_000,
            idle_ttl: 600,
            trusted_proxies: Vec::new(),
        }
    }
}

/// 验证码配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub code_length: usize,
    /// 验证码有效期（秒）
    pub code_expire: u64,
    /// 重发间隔（秒）
    pub resend_delay: u64,
    pub max_attempts: i64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_expire: 5 * 60,
            resend_delay: 60,
            max_attempts: 5,
        }
    }
}

/// 邮件服务提供方
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    /// 仅写日志，开发环境使用
    #[default]
    Log,
    Resend,
}

/// 邮件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    pub from_address: String,
    pub from_name: String,
    pub resend_api_key: Option<String>,
    pub resend_base_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: EmailProvider::Log,
            from_address: "noreply@lexveritas.local".to_string(),
            from_name: "LexVeritas".to_string(),
            resend_api_key: None,
            resend_base_url: "https://api.resend.com".to_string(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 签名密钥最短长度（字节）
pub const MIN_JWT_SECRET_LEN: usize = 32;

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt.secret.trim().is_empty() {
            return Err("jwt.secret 未配置，拒绝启动".to_string());
        }
        if self.jwt.secret.len() < MIN_JWT_SECRET_LEN {
            return Err(format!("jwt.secret 长度不能少于 {MIN_JWT_SECRET_LEN} 字节"));
        }
        if self.jwt.access_expire == 0 || self.jwt.refresh_expire == 0 {
            return Err("jwt 令牌有效期必须大于 0".to_string());
        }
        if self.jwt.issuer.is_empty() {
            return Err("jwt.issuer 不能为空".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        match self.cache.cache_type {
            CacheType::Memory => {
                if self.cache.memory_max_entries == 0 {
                    return Err("cache.memory_max_entries 必须大于 0".to_string());
                }
            }
            CacheType::Redis => {
                let redis = self
                    .cache
                    .redis
                    .as_ref()
                    .ok_or_else(|| "Redis cache configuration must be provided".to_string())?;
                if redis.url.is_empty() {
                    return Err("Redis URL cannot be empty".to_string());
                }
            }
        }

        if self.auth.max_login_attempts <= 0 || self.auth.lockout_duration == 0 {
            return Err("auth 锁定策略配置无效".to_string());
        }

        if self.rate_limit.enabled && (self.rate_limit.rate == 0 || self.rate_limit.burst == 0) {
            return Err("启用限流时 rate 与 burst 必须大于 0".to_string());
        }
        if self.rate_limit.max_tracked_clients == 0 {
            return Err("rate_limit.max_tracked_clients 必须大于 0".to_string());
        }

        if !(4..=10).contains(&self.verification.code_length) {
            return Err("verification.code_length 必须在 4 到 10 之间".to_string());
        }
        if self.verification.code_expire == 0 || self.verification.max_attempts <= 0 {
            return Err("verification 配置无效".to_string());
        }

        if self.guest.max_chats_per_session <= 0 || self.guest.session_ttl == 0 {
            return Err("guest 配置无效".to_string());
        }
        if self.guest.cookie_name.is_empty() {
            return Err("guest.cookie_name 不能为空".to_string());
        }

        if self.email.provider == EmailProvider::Resend
            && self.email.resend_api_key.as_deref().is_none_or(str::is_empty)
        {
            return Err("使用 resend 发送邮件时必须配置 resend_api_key".to_string());
        }

        Ok(())
    }

    /// HTTP 监听地址
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.jwt.secret = "0123456789abcdef0123456789abcdef".to_string();
        config
    }

    #[test]
    fn test_default_with_secret_is_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.contains("jwt.secret"));

        let mut short = valid_config();
        short.jwt.secret = "too-short".to_string();
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_redis_requires_url() {
        let mut config = valid_config();
        config.cache.cache_type = CacheType::Redis;
        assert!(config.validate().is_err());

        config.cache.redis = Some(RedisConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_and_code_length() {
        let mut config = valid_config();
        config.rate_limit.burst = 0;
        assert!(config.validate().is_err());

        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());

        config.verification.code_length = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resend_requires_key() {
        let mut config = valid_config();
        config.email.provider = EmailProvider::Resend;
        assert!(config.validate().is_err());

        config.email.resend_api_key = Some("re_test".to_string());
        assert!(config.validate().is_ok());
    }
}
