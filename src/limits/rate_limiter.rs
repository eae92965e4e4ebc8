//! # 客户端限流
//!
//! 每个客户端一个令牌桶，桶表只在进程内维护。
//! 查找走读锁，首次创建在写锁下二次检查；桶表容量有上限，
//! 超出时先回收空闲桶，仍不足则淘汰最久未访问的桶。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 令牌桶
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    /// 新桶为满桶
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: u32, now: Instant) -> Self {
        Self {
            capacity: f64::from(capacity),
            tokens: f64::from(capacity),
            refill_per_sec: f64::from(refill_per_sec),
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = elapsed.mul_add(self.refill_per_sec, self.tokens).min(self.capacity);
        self.last_refill = now;
    }

    /// 尝试消耗一个令牌
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.last_seen = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

type SharedBucket = Arc<Mutex<TokenBucket>>;

/// 按客户端标识限流
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<String, SharedBucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.config.idle_ttl)
    }

    /// 当前跟踪的客户端数
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 判断请求是否放行，禁用时总是放行
    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    /// 以指定时间点判断请求是否放行
    pub fn allow_at(&self, client: &str, now: Instant) -> bool {
        if !self.config.enabled {
            return true;
        }
        let bucket = self.bucket_for(client, now);
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_acquire(now)
    }

    fn bucket_for(&self, client: &str, now: Instant) -> SharedBucket {
        {
            let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(bucket) = buckets.get(client) {
                return bucket.clone();
            }
        }

        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        // 二次检查，避免并发首次请求重复创建
        if let Some(bucket) = buckets.get(client) {
            return bucket.clone();
        }

        if buckets.len() >= self.config.max_tracked_clients {
            Self::remove_idle(&mut buckets, now, self.idle_ttl());
        }
        if buckets.len() >= self.config.max_tracked_clients {
            Self::evict_stalest(&mut buckets);
        }

        let bucket = Arc::new(Mutex::new(TokenBucket::new(
            self.config.burst,
            self.config.rate,
            now,
        )));
        buckets.insert(client.to_string(), bucket.clone());
        bucket
    }

    fn last_seen(bucket: &SharedBucket) -> Instant {
        bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_seen
    }

    fn remove_idle(buckets: &mut HashMap<String, SharedBucket>, now: Instant, idle_ttl: Duration) -> usize {
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(Self::last_seen(bucket)) < idle_ttl);
        before - buckets.len()
    }

    fn evict_stalest(buckets: &mut HashMap<String, SharedBucket>) {
        let stalest = buckets
            .iter()
            .min_by_key(|(_, bucket)| Self::last_seen(bucket))
            .map(|(client, _)| client.clone());
        if let Some(client) = stalest {
            buckets.remove(&client);
        }
    }

    /// 回收空闲超过 `idle_ttl` 的桶，返回回收数量
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let removed = Self::remove_idle(&mut buckets, now, self.idle_ttl());
        if removed > 0 {
            ldebug!(
                "system",
                LogStage::Throttle,
                LogComponent::RateLimiter,
                "sweep_idle",
                &format!("回收空闲限流桶: {removed}")
            );
        }
        removed
    }

    /// 启动后台空闲回收任务
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        let period = (self.idle_ttl() / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep_idle(Instant::now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rate: u32, burst: u32, max_clients: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            rate,
            burst,
            max_tracked_clients: max_clients,
            idle_ttl: 60,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn test_burst_then_refill() {
        let limiter = limiter(2, 5, 100);
        let start = Instant::now();

        let admitted = (0..6).filter(|_| limiter.allow_at("1.2.3.4", start)).count();
        assert_eq!(admitted, 5);

        // 1/R 秒后恰好补充一个令牌
        let later = start + Duration::from_millis(500);
        assert!(limiter.allow_at("1.2.3.4", later));
        assert!(!limiter.allow_at("1.2.3.4", later));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1, 1, 100);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn test_disabled_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        assert!((0..1000).all(|_| limiter.allow("x")));
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_map_is_bounded() {
        let limiter = limiter(1, 1, 3);
        let now = Instant::now();
        for i in 0..10_u64 {
            limiter.allow_at(&format!("10.0.0.{i}"), now + Duration::from_millis(i));
        }
        assert_eq!(limiter.tracked_clients(), 3);
    }

    #[test]
    fn test_sweep_idle() {
        let limiter = limiter(1, 1, 100);
        let now = Instant::now();
        limiter.allow_at("old", now);
        limiter.allow_at("fresh", now + Duration::from_secs(90));

        assert_eq!(limiter.sweep_idle(now + Duration::from_secs(100)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_first_requests_share_one_bucket() {
        let limiter = Arc::new(limiter(1, 10, 100));
        let now = Instant::now();
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.allow_at("same", now))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 10);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
