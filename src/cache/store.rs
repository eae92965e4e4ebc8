//! # 会话存储抽象层
//!
//! 提供带 TTL 的键值存储接口，支持内存存储和 Redis 存储。
//! 组合操作（取出即删、带上限自增）由后端原子完成。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use redis::{Client, Script, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::{CacheConfig, CacheType};
use crate::error::{GateError, Result};
use crate::{lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 会话存储 trait
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 获取值，不存在或已过期返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 设置值，`ttl` 为 `None` 时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// 删除多个键，返回实际删除的数量
    async fn delete(&self, keys: &[&str]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// 自增并返回新值，不改变已有 TTL
    async fn incr(&self, key: &str, delta: i64) -> Result<i64>;

    /// 设置过期时间，键不存在时返回 `false`
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 剩余存活时间，键不存在或无过期时间时返回 `None`
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// 原子地取出并删除
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// 原子自增，首次创建时设置 TTL
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64>;

    /// 原子自增，仅当当前值小于 `limit` 时生效，成功后刷新 TTL
    ///
    /// 已达上限时返回 `None`
    async fn bounded_incr(&self, key: &str, limit: i64, ttl: Duration) -> Result<Option<i64>>;

    /// 连通性检查
    async fn ping(&self) -> Result<()>;

    /// 后端名称
    fn backend(&self) -> &'static str;
}

impl dyn SessionStore {
    /// 读取 JSON 值
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// 以 JSON 写入
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }

    /// 读取计数器，不存在视为 0
    pub async fn get_counter(&self, key: &str) -> Result<i64> {
        match self.get(key).await? {
            Some(raw) => raw
                .parse()
                .map_err(|_| GateError::store(format!("计数器值不是整数: {key}"))),
            None => Ok(0),
        }
    }
}

/// 内存存储项
#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

fn parse_counter(key: &str, raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| GateError::store(format!("计数器值不是整数: {key}")))
}

/// 内存存储实现（单实例部署）
pub struct MemoryStore {
    data: DashMap<String, StoreEntry>,
    max_entries: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            data: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// 当前条目数（含尚未清理的过期项）
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 新键写入前保证容量：先清理过期项，仍满则拒绝写入
    ///
    /// 未过期的条目从不淘汰，锁定计数与注销黑名单在存储写满时依然有效。
    /// 不能在持有任何条目引用时调用。
    fn ensure_capacity(&self, key: &str) -> Result<()> {
        if self.data.len() < self.max_entries || self.data.contains_key(key) {
            return Ok(());
        }

        let now = Instant::now();
        self.data.retain(|_, entry| !entry.is_expired(now));

        if self.data.len() >= self.max_entries {
            lwarn!(
                "system",
                LogStage::Cache,
                LogComponent::Cache,
                "memory_store_full",
                &format!("内存存储已满，拒绝写入新键: max_entries={}", self.max_entries)
            );
            return Err(GateError::store(format!(
                "内存存储已满: max_entries={}",
                self.max_entries
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let value = self
            .data
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            self.data.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.ensure_capacity(key)?;
        self.data
            .insert(key.to_string(), StoreEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|key| self.data.remove(*key))
            .filter(|(_, entry)| !entry.is_expired(now))
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        self.ensure_capacity(key)?;
        let now = Instant::now();
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    *entry = StoreEntry::new(delta.to_string(), None);
                    return Ok(delta);
                }
                let next = parse_counter(key, &entry.value)? + delta;
                entry.value = next.to_string();
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoreEntry::new(delta.to_string(), None));
                Ok(delta)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.data.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self
            .data
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .data
            .remove(key)
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(_, entry)| entry.value))
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64> {
        self.ensure_capacity(key)?;
        let now = Instant::now();
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    *entry = StoreEntry::new("1".to_string(), Some(ttl));
                    return Ok(1);
                }
                let next = parse_counter(key, &entry.value)? + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoreEntry::new("1".to_string(), Some(ttl)));
                Ok(1)
            }
        }
    }

    async fn bounded_incr(&self, key: &str, limit: i64, ttl: Duration) -> Result<Option<i64>> {
        self.ensure_capacity(key)?;
        let now = Instant::now();
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let current = if entry.is_expired(now) {
                    0
                } else {
                    parse_counter(key, &entry.value)?
                };
                if current >= limit {
                    return Ok(None);
                }
                *entry = StoreEntry::new((current + 1).to_string(), Some(ttl));
                Ok(Some(current + 1))
            }
            Entry::Vacant(vacant) => {
                if limit <= 0 {
                    return Ok(None);
                }
                vacant.insert(StoreEntry::new("1".to_string(), Some(ttl)));
                Ok(Some(1))
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// 首次自增时设置过期时间
const INCR_WITH_TTL_LUA: &str = r"
local v = redis.call('INCR', KEYS[1])
if v == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return v
";

/// 未达上限时自增并刷新过期时间，达到上限返回 -1
const BOUNDED_INCR_LUA: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
    return -1
end
local v = redis.call('INCR', KEYS[1])
redis.call('PEXPIRE', KEYS[1], ARGV[2])
return v
";

/// Redis 存储实现（多实例共享）
pub struct RedisStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    incr_with_ttl_script: Script,
    bounded_incr_script: Script,
}

impl RedisStore {
    /// 建立 Redis 连接
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Cache,
            "connect_to_redis",
            "正在连接 Redis 服务器"
        );

        let client = Client::open(url)
            .map_err(|e| GateError::store_with_source("创建 Redis 客户端失败", e))?;

        let conn = tokio::time::timeout(op_timeout * 5, ConnectionManager::new(client))
            .await
            .map_err(|_| GateError::store("建立 Redis 连接超时"))?
            .map_err(|e| GateError::store_with_source("建立 Redis 连接失败", e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Cache,
            "redis_connected",
            "Redis 连接建立成功"
        );

        Ok(Self {
            conn,
            op_timeout,
            incr_with_ttl_script: Script::new(INCR_WITH_TTL_LUA),
            bounded_incr_script: Script::new(BOUNDED_INCR_LUA),
        })
    }

    /// 在操作超时内执行一次 Redis 调用
    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                lerror!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Cache,
                    op,
                    &format!("Redis {op} 失败: {e}")
                );
                Err(GateError::store_with_source(format!("Redis {op} 失败"), e))
            }
            Err(_) => Err(GateError::store(format!("Redis {op} 超时"))),
        }
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("GET", async move {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        self.run("SET", async move {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(ttl) = ttl {
                cmd.arg("PX").arg(millis(ttl));
            }
            cmd.query_async(&mut conn).await
        })
        .await
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        self.run("DEL", async move {
            redis::cmd("DEL").arg(keys).query_async(&mut conn).await
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        self.run("EXISTS", async move {
            redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        self.run("INCRBY", async move {
            redis::cmd("INCRBY").arg(key).arg(delta).query_async(&mut conn).await
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        self.run("PEXPIRE", async move {
            redis::cmd("PEXPIRE")
                .arg(key)
                .arg(millis(ttl))
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn.clone();
        let remaining: i64 = self
            .run("PTTL", async move {
                redis::cmd("PTTL").arg(key).query_async(&mut conn).await
            })
            .await?;
        // -2 表示不存在，-1 表示无过期时间
        Ok(u64::try_from(remaining).ok().map(Duration::from_millis))
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("GETDEL", async move {
            redis::cmd("GETDEL").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64> {
        let mut conn = self.conn.clone();
        let script = &self.incr_with_ttl_script;
        self.run("INCR_WITH_TTL", async move {
            script
                .key(key)
                .arg(millis(ttl))
                .invoke_async(&mut conn)
                .await
        })
        .await
    }

    async fn bounded_incr(&self, key: &str, limit: i64, ttl: Duration) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let script = &self.bounded_incr_script;
        let value: i64 = self
            .run("BOUNDED_INCR", async move {
                script
                    .key(key)
                    .arg(limit)
                    .arg(millis(ttl))
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok((value >= 0).then_some(value))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = self
            .run("PING", async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// 根据配置创建会话存储
pub async fn build_store(config: &CacheConfig) -> Result<Arc<dyn SessionStore>> {
    match config.cache_type {
        CacheType::Memory => {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Cache,
                "memory_store",
                &format!("使用内存存储，最大条目数: {}", config.memory_max_entries)
            );
            Ok(Arc::new(MemoryStore::new(config.memory_max_entries)))
        }
        CacheType::Redis => {
            let redis = config
                .redis
                .as_ref()
                .ok_or_else(|| GateError::config("缺少 Redis 配置"))?;
            let store = RedisStore::connect(&redis.url, config.op_timeout()).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> Arc<dyn SessionStore> {
        Arc::new(MemoryStore::new(100))
    }

    #[tokio::test]
    async fn test_set_get_and_expiry() {
        let store = store();
        store.set("k", "v", Some(Duration::from_millis(30))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.ttl("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = store();
        store.set("once", "payload", None).await.unwrap();

        assert_eq!(store.take("once").await.unwrap().as_deref(), Some("payload"));
        assert_eq!(store.take("once").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_take_yields_one_winner() {
        let store = store();
        store.set("race", "x", None).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.take("race").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_incr_with_ttl_sets_ttl_on_first() {
        let store = store();
        assert_eq!(store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(store.incr_with_ttl("c", Duration::from_secs(60)).await.unwrap(), 2);
        assert!(store.ttl("c").await.unwrap().is_some());
        assert_eq!(store.get_counter("c").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bounded_incr_stops_at_limit() {
        let store = store();
        for expected in 1..=3 {
            assert_eq!(
                store.bounded_incr("b", 3, Duration::from_secs(60)).await.unwrap(),
                Some(expected)
            );
        }
        assert_eq!(store.bounded_incr("b", 3, Duration::from_secs(60)).await.unwrap(), None);
        assert_eq!(store.get_counter("b").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_bounded_incr_never_exceeds_limit() {
        let store = store();
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .bounded_incr("guest", 5, Duration::from_secs(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[tokio::test]
    async fn test_delete_and_expire() {
        let store = store();
        store.set("a", "1", None).await.unwrap();
        store.set("b", "2", None).await.unwrap();

        assert!(store.expire("a", Duration::from_secs(10)).await.unwrap());
        assert!(!store.expire("missing", Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.delete(&["a", "b", "missing"]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = store();
        store
            .set_json("j", &vec![1_u8, 2, 3], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        let value: Option<Vec<u8>> = store.get_json("j").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_full_store_rejects_new_keys() {
        let store = MemoryStore::new(3);
        for i in 0..3 {
            store
                .set(&format!("k{i}"), "v", Some(Duration::from_secs(60)))
                .await
                .unwrap();
        }

        let err = store.set("k3", "v", None).await.unwrap_err();
        assert!(matches!(err, GateError::Store { .. }));
        assert!(store.incr_with_ttl("k4", Duration::from_secs(1)).await.is_err());
        assert_eq!(store.len(), 3);

        // 已存在的键仍可更新
        store.set("k0", "v2", None).await.unwrap();
        assert_eq!(store.get("k0").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_full_store_keeps_live_security_keys() {
        let store = MemoryStore::new(3);
        store
            .set("auth:blacklist:jti-1", "1", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store
            .incr_with_ttl("auth:attempts:victim@example.com", Duration::from_secs(2))
            .await
            .unwrap();
        store.set("filler", "x", None).await.unwrap();

        for i in 0..5 {
            let _ = store
                .incr_with_ttl(&format!("auth:attempts:junk{i}@example.com"), Duration::from_secs(900))
                .await;
        }

        assert!(store.exists("auth:blacklist:jti-1").await.unwrap());
        assert_eq!(
            (&store as &dyn SessionStore).get_counter("auth:attempts:victim@example.com").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_expired_entries_free_capacity() {
        let store = MemoryStore::new(2);
        store.set("short", "v", Some(Duration::from_millis(20))).await.unwrap();
        store.set("long", "v", None).await.unwrap();
        assert!(store.set("next", "v", None).await.is_err());

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.set("next", "v", None).await.unwrap();
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let store = store();
        store.set("text", "abc", None).await.unwrap();
        let err = store.incr("text", 1).await.unwrap_err();
        assert!(matches!(err, GateError::Store { .. }));
    }
}
