//! # 匿名用户限制
//!
//! 匿名用户通过 Cookie 中的 guest id 识别，每个会话窗口内允许有限次对话。
//! 计数在存储中以原子有界自增维护，到达上限后不再增长，直到窗口过期。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheKey, SessionStore};
use crate::config::GuestConfig;
use crate::error::{GateError, Result};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 对话次数耗尽时返回给客户端的提示
pub const GUEST_LIMIT_MESSAGE: &str = "您已达到免费对话限制，请登录以继续使用";

/// 当前请求的匿名用户上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestContext {
    pub guest_id: String,
    pub chat_count: i64,
    pub remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// 本次请求新分配的 guest id，需要下发 Cookie
    #[serde(skip)]
    pub is_new: bool,
}

/// 匿名用户限流器
pub struct GuestThrottle {
    store: Arc<dyn SessionStore>,
    config: GuestConfig,
}

impl GuestThrottle {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: GuestConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.config.session_ttl)
    }

    /// 从 Cookie 头解析 guest id，缺失或格式不合法时分配新的 id
    ///
    /// 返回 `(guest_id, is_new)`
    #[must_use]
    pub fn resolve_guest_id(&self, cookie_header: Option<&str>) -> (String, bool) {
        let existing = cookie_header.and_then(|header| {
            header
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(name, _)| *name == self.config.cookie_name)
                .map(|(_, value)| value.trim())
                .filter(|value| uuid::Uuid::parse_str(value).is_ok())
                .map(str::to_string)
        });

        match existing {
            Some(id) => (id, false),
            None => (uuid::Uuid::new_v4().to_string(), true),
        }
    }

    /// `Set-Cookie` 头的值
    #[must_use]
    pub fn cookie_value(&self, guest_id: &str) -> String {
        let mut cookie = format!(
            "{}={guest_id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.config.cookie_name, self.config.session_ttl
        );
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// 检查匿名用户是否仍可对话
    ///
    /// 会话不存在视为全新的匿名用户
    pub async fn check(&self, guest_id: &str, is_new: bool) -> Result<GuestContext> {
        let chats_key = CacheKey::GuestChats { guest_id: guest_id.to_string() }.build();
        let chat_count = if is_new {
            0
        } else {
            self.store.get_counter(&chats_key).await?
        };

        if chat_count >= self.config.max_chats_per_session {
            ldebug!(
                "system",
                LogStage::Throttle,
                LogComponent::GuestThrottle,
                "guest_limit_reached",
                &format!("匿名用户对话次数已达上限: guest_id={guest_id}, count={chat_count}")
            );
            return Err(GateError::forbidden(GUEST_LIMIT_MESSAGE));
        }

        let session_id = if is_new {
            None
        } else {
            self.store
                .get(&CacheKey::GuestSession { guest_id: guest_id.to_string() }.build())
                .await?
        };

        Ok(GuestContext {
            guest_id: guest_id.to_string(),
            chat_count,
            remaining: self.config.max_chats_per_session - chat_count,
            session_id,
            is_new,
        })
    }

    /// 记录一次已完成的对话，返回记录后的对话次数
    ///
    /// 计数与窗口 TTL 原子更新，到达上限后拒绝
    pub async fn record_chat(&self, guest_id: &str, session_id: &str) -> Result<i64> {
        let chats_key = CacheKey::GuestChats { guest_id: guest_id.to_string() }.build();
        let Some(count) = self
            .store
            .bounded_incr(&chats_key, self.config.max_chats_per_session, self.session_ttl())
            .await?
        else {
            return Err(GateError::forbidden(GUEST_LIMIT_MESSAGE));
        };

        let session_key = CacheKey::GuestSession { guest_id: guest_id.to_string() }.build();
        self.store
            .set(&session_key, session_id, Some(self.session_ttl()))
            .await?;

        Ok(count)
    }

    /// 剩余可用对话次数
    #[must_use]
    pub const fn remaining_after(&self, count: i64) -> i64 {
        let left = self.config.max_chats_per_session - count;
        if left < 0 { 0 } else { left }
    }
}
