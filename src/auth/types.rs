//! # 认证类型定义
//!
//! 访问令牌载荷、刷新令牌记录与请求级身份

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::permissions::UserRole;

/// 令牌类型
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// 访问令牌载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// 用户ID
    pub uid: String,
    pub role: UserRole,
    /// JWT ID，作为黑名单键
    pub jti: String,
    /// 签发者
    pub iss: String,
    /// 签发时间
    pub iat: i64,
    /// 生效时间
    pub nbf: i64,
    /// 过期时间
    pub exp: i64,
}

impl AccessClaims {
    /// 剩余有效期（秒），已过期返回 0
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        u64::try_from(self.exp - Utc::now().timestamp()).unwrap_or(0)
    }
}

/// 刷新令牌记录，以令牌哈希为键保存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRecord {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// 请求级身份，由认证中间件写入请求扩展
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub role: UserRole,
    pub claims: AccessClaims,
}

impl Identity {
    #[must_use]
    pub fn from_claims(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.uid.clone(),
            role: claims.role,
            claims,
        }
    }
}
