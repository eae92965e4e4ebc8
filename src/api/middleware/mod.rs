//! # HTTP 中间件

pub mod auth;
pub mod guest;
pub mod quota;
pub mod rate_limit;
pub mod request_id;

pub use auth::{AllowedRoles, bearer_token, jwt_auth, optional_auth, require_role};
pub use guest::guest_throttle;
pub use quota::quota_guard;
pub use rate_limit::{client_ip, rate_limit};
pub use request_id::{RequestId, request_id_middleware};
