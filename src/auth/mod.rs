//! # 认证模块
//!
//! 令牌编解码、密码管理、验证码与认证服务

pub mod jwt;
pub mod password;
pub mod permissions;
pub mod service;
pub mod types;
pub mod verification;

pub use jwt::{TokenCodec, TokenError, TokenPair};
pub use password::PasswordVault;
pub use permissions::{UserRole, UserStatus};
pub use service::{CredentialGate, LoginOutcome, NewAccount};
pub use types::{AccessClaims, Identity, RefreshRecord};
pub use verification::{VerificationCodeManager, VerificationPurpose};
