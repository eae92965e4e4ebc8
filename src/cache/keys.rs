//! # 缓存键命名规范
//!
//! 网关所有存储键都在这里定义，其他模块不拼接键字符串

use std::fmt;

use crate::auth::service::normalize_email;

/// 存储键类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// 刷新令牌记录 - `auth:refresh:{token_hash}`
    RefreshToken { token_hash: String },

    /// 已注销访问令牌 - `auth:blacklist:{jti}`
    Blacklist { jti: String },

    /// 登录失败计数 - `auth:attempts:{email}`
    LoginAttempts { email: String },

    /// 验证码 - `verify:code:{purpose}:{email}`
    VerifyCode { purpose: String, email: String },

    /// 重发冷却标记 - `verify:limit:{email}`
    VerifyCooldown { email: String },

    /// 验证失败计数 - `verify:attempts:{email}`
    VerifyAttempts { email: String },

    /// 匿名对话计数 - `guest:chats:{guest_id}`
    GuestChats { guest_id: String },

    /// 匿名当前会话 - `guest:session:{guest_id}`
    GuestSession { guest_id: String },
}

impl CacheKey {
    /// 生成缓存键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::RefreshToken { token_hash } => format!("auth:refresh:{token_hash}"),
            Self::Blacklist { jti } => format!("auth:blacklist:{jti}"),
            Self::LoginAttempts { email } => {
                format!("auth:attempts:{}", normalize_email(email))
            }
            Self::VerifyCode { purpose, email } => {
                format!("verify:code:{purpose}:{}", normalize_email(email))
            }
            Self::VerifyCooldown { email } => format!("verify:limit:{}", normalize_email(email)),
            Self::VerifyAttempts { email } => {
                format!("verify:attempts:{}", normalize_email(email))
            }
            Self::GuestChats { guest_id } => format!("guest:chats:{guest_id}"),
            Self::GuestSession { guest_id } => format!("guest:session:{guest_id}"),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}
