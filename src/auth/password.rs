//! # 密码管理
//!
//! bcrypt 哈希与密码强度校验。哈希计算放在阻塞线程池中执行。

use crate::error::{GateError, Result};

/// bcrypt 默认 cost
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// 最小密码长度
pub const MIN_PASSWORD_LENGTH: usize = 8;

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// 密码管理器
#[derive(Debug, Clone, Copy)]
pub struct PasswordVault {
    cost: u32,
}

impl PasswordVault {
    /// 超出 bcrypt 合法范围的 cost 回退为默认值
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        let cost = if cost < MIN_COST || cost > MAX_COST {
            DEFAULT_BCRYPT_COST
        } else {
            cost
        };
        Self { cost }
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// 对密码进行哈希
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| GateError::internal_with_source("密码哈希任务失败", e))?
            .map_err(|e| GateError::internal_with_source("密码哈希失败", e))
    }

    /// 验证密码，任何不一致（含哈希格式错误）都返回 `false`
    pub async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

impl Default for PasswordVault {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

/// 验证密码强度
pub fn validate_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(GateError::TooShort);
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_numeric() {
            has_digit = true;
        } else if c.is_ascii_punctuation() || !(c.is_alphanumeric() || c.is_whitespace() || c.is_control()) {
            has_special = true;
        }
    }

    if has_upper && has_lower && has_digit && has_special {
        Ok(())
    } else {
        Err(GateError::TooWeak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("abc", "too_short")]
    #[case("Ab1!", "too_short")]
    #[case("abcdefgh", "too_weak")]
    #[case("ABCDEFG1!", "too_weak")]
    #[case("Abcdefgh1", "too_weak")]
    #[case("Abcdefg!", "too_weak")]
    #[case("Abcdef1!", "ok")]
    #[case("Pässwört1€", "ok")]
    fn test_validate_strength(#[case] password: &str, #[case] expected: &str) {
        let result = validate_strength(password);
        match expected {
            "too_short" => assert!(matches!(result, Err(GateError::TooShort))),
            "too_weak" => assert!(matches!(result, Err(GateError::TooWeak))),
            _ => assert!(result.is_ok()),
        }
    }

    #[test]
    fn test_cost_clamped() {
        assert_eq!(PasswordVault::new(2).cost(), DEFAULT_BCRYPT_COST);
        assert_eq!(PasswordVault::new(40).cost(), DEFAULT_BCRYPT_COST);
        assert_eq!(PasswordVault::new(4).cost(), 4);
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let vault = PasswordVault::new(4);
        let hash = vault.hash_password("Abcdef1!").await.unwrap();

        assert_ne!(hash, "Abcdef1!");
        assert!(vault.verify_password("Abcdef1!", &hash).await);
        assert!(!vault.verify_password("Abcdef1?", &hash).await);
        assert!(!vault.verify_password("Abcdef1!", "not-a-bcrypt-hash").await);
    }

    fn strong_password() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{3,10}[0-9]{1,3}[!@#%&*]"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_strong_passwords_round_trip(password in strong_password(), other in strong_password()) {
            prop_assert!(validate_strength(&password).is_ok());

            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let vault = PasswordVault::new(4);
            let hash = rt.block_on(vault.hash_password(&password)).unwrap();
            prop_assert!(rt.block_on(vault.verify_password(&password, &hash)));
            if other != password {
                prop_assert!(!rt.block_on(vault.verify_password(&other, &hash)));
            }
        }

        #[test]
        fn prop_short_passwords_rejected(password in ".{0,7}") {
            prop_assert!(matches!(validate_strength(&password), Err(GateError::TooShort)));
        }
    }
}
