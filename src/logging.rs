//! # 日志配置模块
//!
//! 初始化 tracing 订阅器，并提供带阶段/组件字段的结构化日志宏

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Shutdown,
    /// 请求进入网关链路
    Request,
    Authentication,
    Authorization,
    Throttle,
    Verification,
    Cache,
    Db,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Request => "request",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Throttle => "throttle",
            Self::Verification => "verification",
            Self::Cache => "cache",
            Self::Db => "db",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    Config,
    Database,
    Cache,
    TokenCodec,
    CredentialGate,
    AccessGate,
    GuestThrottle,
    QuotaGovernor,
    RateLimiter,
    Verification,
    Email,
    Http,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::TokenCodec => "token_codec",
            Self::CredentialGate => "credential_gate",
            Self::AccessGate => "access_gate",
            Self::GuestThrottle => "guest_throttle",
            Self::QuotaGovernor => "quota_governor",
            Self::RateLimiter => "rate_limiter",
            Self::Verification => "verification",
            Self::Email => "email",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志: `linfo!(request_id, stage, component, operation, message)`
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先生效，否则使用传入的级别。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");

    // 默认关闭 sqlx 查询日志
    let default_filter = format!("{level},lex_gate=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt_layer::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    if env::var("RUST_LOG").is_ok() {
        tracing::info!("日志过滤由 RUST_LOG 控制");
    }
}

/// 对令牌做脱敏处理，仅保留首尾少量字符
#[must_use]
pub fn sanitize_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// 邮箱脱敏: `abcdef@x.com` -> `ab***@x.com`
#[must_use]
pub fn mask_email(email: &str) -> String {
    if email.chars().count() < 5 {
        return "***".to_string();
    }
    match email.find('@') {
        Some(at) if at >= 2 => {
            let prefix: String = email.chars().take(2).collect();
            format!("{prefix}***{}", &email[at..])
        }
        Some(at) => format!("***{}", &email[at..]),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "al***@example.com");
        assert_eq!(mask_email("a@example.com"), "***@example.com");
        assert_eq!(mask_email("a@b"), "***");
        assert_eq!(mask_email("no-at-sign"), "***");
    }

    #[test]
    fn test_sanitize_token() {
        assert_eq!(sanitize_token("short"), "***");
        assert_eq!(sanitize_token("eyJhbGciOiJIUzI1NiJ9.payload.sig"), "eyJhbG....sig");
    }
}
