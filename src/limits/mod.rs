//! # 访问限制
//!
//! 客户端限流、匿名用户对话次数限制与用户额度控制

pub mod guest;
pub mod quota;
pub mod rate_limiter;

pub use guest::{GuestContext, GuestThrottle};
pub use quota::{QuotaAllowance, QuotaGovernor, UsageStats};
pub use rate_limiter::{RateLimiter, TokenBucket};
