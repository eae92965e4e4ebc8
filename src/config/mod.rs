//! # 配置管理模块
//!
//! 处理应用配置加载、环境变量覆盖与验证

mod app_config;
mod database;

pub use app_config::{
    AppConfig, AuthConfig, CacheConfig, CacheType, EmailConfig, EmailProvider, GuestConfig,
    JwtConfig, LogConfig, MIN_JWT_SECRET_LEN, RateLimitConfig, RedisConfig, ServerConfig,
    VerificationConfig,
};
pub use database::DatabaseConfig;

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{GateError, Result};
use crate::{config_error, linfo, logging::{LogComponent, LogStage}};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "LEX_GATE_CONFIG_PATH";

/// 敏感配置的环境变量覆盖
const ENV_JWT_SECRET: &str = "LEX_GATE_JWT_SECRET";
const ENV_DATABASE_URL: &str = "LEX_GATE_DATABASE_URL";
const ENV_REDIS_URL: &str = "LEX_GATE_REDIS_URL";
const ENV_RESEND_API_KEY: &str = "LEX_GATE_RESEND_API_KEY";

/// 解析配置文件路径
///
/// 优先级: 显式路径 > `LEX_GATE_CONFIG_PATH` > `config/config.{RUST_ENV}.toml`
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置文件
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config_file = resolve_config_path(explicit);

    if !config_file.exists() {
        return Err(config_error!("配置文件不存在: {}", config_file.display()));
    }

    let content = std::fs::read_to_string(&config_file).map_err(|e| {
        GateError::config_with_source(format!("读取配置文件失败: {}", config_file.display()), e)
    })?;

    let config = parse_config(&content)?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Config,
        "config_loaded",
        &format!("配置加载完成: {}", config_file.display())
    );

    Ok(config)
}

/// 从 TOML 文本解析配置，应用环境变量覆盖并验证
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let mut config: AppConfig = toml::from_str(content)?;
    apply_overrides(&mut config, |name| env::var(name).ok());
    config.validate().map_err(GateError::config)?;
    Ok(config)
}

/// 应用环境变量覆盖，`lookup` 按变量名返回取值
fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(secret) = lookup(ENV_JWT_SECRET) {
        config.jwt.secret = secret;
    }
    if let Some(url) = lookup(ENV_DATABASE_URL) {
        config.database.url = url;
    }
    if let Some(url) = lookup(ENV_REDIS_URL) {
        config.cache.redis.get_or_insert_with(RedisConfig::default).url = url;
    }
    if let Some(key) = lookup(ENV_RESEND_API_KEY) {
        config.email.resend_api_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
port = 9000

[jwt]
secret = "0123456789abcdef0123456789abcdef"
access_expire = 600

[rate_limit]
rate = 5
burst = 10
"#;

    #[test]
    #[serial]
    fn test_parse_config_with_defaults() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.jwt.access_expire, 600);
        assert_eq!(config.jwt.refresh_expire, 7 * 24 * 3600);
        assert_eq!(config.rate_limit.burst, 10);
        assert_eq!(config.verification.code_length, 6);
        assert_eq!(config.guest.cookie_name, "lex_guest_id");
    }

    #[test]
    #[serial]
    fn test_missing_secret_is_fatal() {
        let err = parse_config("[server]\nport = 8080\n").unwrap_err();
        assert!(matches!(err, GateError::Config { .. }));
    }

    #[test]
    fn test_overrides_replace_secrets() {
        let mut config: AppConfig = toml::from_str(SAMPLE).unwrap();
        apply_overrides(&mut config, |name| match name {
            ENV_JWT_SECRET => Some("fedcba9876543210fedcba9876543210".to_string()),
            ENV_REDIS_URL => Some("redis://cache:6379/1".to_string()),
            _ => None,
        });

        assert_eq!(config.jwt.secret, "fedcba9876543210fedcba9876543210");
        assert_eq!(config.cache.redis.unwrap().url, "redis://cache:6379/1");
        assert!(config.email.resend_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_load_config_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);

        let missing = load_config(Some(Path::new("/nonexistent/lex-gate.toml")));
        assert!(missing.is_err());
    }
}
