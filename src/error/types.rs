//! # 错误类型定义
//!
//! `GateError` 是全部错误的封闭枚举，`status_and_code` 是唯一的
//! HTTP 状态码与业务错误码映射表。

use axum::http::StatusCode;
use thiserror::Error;

use super::ErrorCategory;

/// 业务错误码
pub type ErrorCode = u32;

/// 成功响应使用的错误码
pub const CODE_SUCCESS: ErrorCode = 0;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum GateError {
    /// 请求参数错误
    #[error("参数错误: {message}")]
    InvalidParam { message: String },

    /// 缺少或无法识别的认证信息
    #[error("未授权: {message}")]
    Unauthorized { message: String },

    /// 权限不足
    #[error("权限不足: {message}")]
    Forbidden { message: String },

    #[error("资源不存在")]
    NotFound,

    /// 单客户端请求速率超限
    #[error("请求过于频繁，请稍后重试")]
    RateLimited,

    #[error("功能尚未实现: {feature}")]
    NotImplemented { feature: String },

    #[error("用户不存在")]
    UserNotFound,

    #[error("邮箱已被注册")]
    EmailExists,

    /// 用户不存在与密码错误共用此错误，避免泄露账户是否存在
    #[error("邮箱或密码错误")]
    InvalidCredentials,

    #[error("无效的令牌")]
    TokenInvalid,

    #[error("令牌已过期")]
    TokenExpired,

    #[error("令牌已被撤销")]
    TokenRevoked,

    #[error("刷新令牌无效或已过期")]
    RefreshTokenInvalid,

    #[error("用户已被禁用或封禁")]
    AccountDisabled,

    #[error("由于尝试次数过多，账户已被锁定")]
    AccountLocked,

    #[error("密码长度至少为 8 位")]
    TooShort,

    #[error("密码必须包含大写字母、小写字母、数字和特殊字符")]
    TooWeak,

    #[error("验证码错误")]
    CodeInvalid,

    #[error("验证码已过期")]
    CodeExpired,

    #[error("验证尝试次数过多")]
    TooManyAttempts,

    #[error("请稍后再发送验证码")]
    CodeSendTooFrequent,

    #[error("您的额度已用完，请联系管理员")]
    QuotaExceeded,

    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 会话存储（Redis / 内存）错误
    #[error("缓存错误: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 邮件投递错误
    #[error("邮件发送错误: {message}")]
    Email {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附加了上下文的错误，映射结果与内部错误一致
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<GateError>,
    },
}

impl GateError {
    /// 错误到 HTTP 状态码与业务错误码的映射表
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            Self::InvalidParam { .. } => (StatusCode::BAD_REQUEST, 1001),
            Self::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, 1002),
            Self::Forbidden { .. } => (StatusCode::FORBIDDEN, 1003),
            Self::NotFound => (StatusCode::NOT_FOUND, 1004),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, 1005),
            Self::NotImplemented { .. } => (StatusCode::NOT_IMPLEMENTED, 1006),
            Self::UserNotFound => (StatusCode::NOT_FOUND, 2001),
            Self::EmailExists => (StatusCode::CONFLICT, 2002),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, 2003),
            Self::TokenInvalid => (StatusCode::UNAUTHORIZED, 2004),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, 2005),
            Self::TokenRevoked => (StatusCode::UNAUTHORIZED, 2006),
            Self::RefreshTokenInvalid => (StatusCode::UNAUTHORIZED, 2007),
            Self::AccountDisabled => (StatusCode::FORBIDDEN, 2008),
            Self::AccountLocked => (StatusCode::FORBIDDEN, 2009),
            Self::TooShort => (StatusCode::BAD_REQUEST, 2010),
            Self::TooWeak => (StatusCode::BAD_REQUEST, 2011),
            Self::CodeInvalid => (StatusCode::BAD_REQUEST, 2101),
            Self::CodeExpired => (StatusCode::BAD_REQUEST, 2102),
            Self::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, 2103),
            Self::CodeSendTooFrequent => (StatusCode::TOO_MANY_REQUESTS, 2104),
            Self::QuotaExceeded => (StatusCode::FORBIDDEN, 2201),
            Self::Internal { .. } | Self::Serialization { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, 5000)
            }
            Self::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, 5001),
            Self::Store { .. } => (StatusCode::INTERNAL_SERVER_ERROR, 5002),
            Self::Email { .. } => (StatusCode::INTERNAL_SERVER_ERROR, 5003),
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, 5004),
            Self::Context { source, .. } => source.status_and_code(),
        }
    }

    /// 错误归类（客户端 / 服务端）
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.status_and_code().0.is_server_error() {
            ErrorCategory::Server
        } else {
            ErrorCategory::Client
        }
    }

    /// 返回给客户端的提示信息
    ///
    /// 服务端错误只返回通用提示，细节仅记录在日志中。
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Context { source, .. } => source.client_message(),
            Self::InvalidParam { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message } => message.clone(),
            Self::Database { .. } => "数据库错误".to_string(),
            Self::Store { .. } => "缓存错误".to_string(),
            Self::Email { .. } => "邮件发送失败，请稍后重试".to_string(),
            Self::Config { .. } | Self::Serialization { .. } | Self::Internal { .. } => {
                "服务器内部错误".to_string()
            }
            other => other.to_string(),
        }
    }

    /// 创建参数错误
    pub fn invalid_param<T: Into<String>>(message: T) -> Self {
        Self::InvalidParam {
            message: message.into(),
        }
    }

    /// 创建未授权错误
    pub fn unauthorized<T: Into<String>>(message: T) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// 创建权限不足错误
    pub fn forbidden<T: Into<String>>(message: T) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_implemented<T: Into<String>>(feature: T) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建缓存错误
    pub fn store<T: Into<String>>(message: T) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的缓存错误
    pub fn store_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建邮件错误
    pub fn email<T: Into<String>>(message: T) -> Self {
        Self::Email {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的邮件错误
    pub fn email_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Email {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<toml::de::Error> for GateError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON处理失败".to_string(),
            source: err.into(),
        }
    }
}

impl From<sea_orm::error::DbErr> for GateError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}

// Redis错误转换
impl From<redis::RedisError> for GateError {
    fn from(err: redis::RedisError) -> Self {
        Self::store_with_source("Redis操作失败", err)
    }
}

// Reqwest错误转换
impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        Self::email_with_source("HTTP请求失败", err)
    }
}
