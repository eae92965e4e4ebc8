//! # 额度控制
//!
//! 非管理员用户在额度耗尽后被拒绝；实际消耗通过仓库的条件更新原子扣减，
//! 检查与扣减之间的竞争不会让已用额度越过上限。
//! 管理员调整额度同样经过这里。

use std::sync::Arc;

use serde::Serialize;

use crate::auth::Identity;
use crate::error::{Context, GateError, Result};
use crate::repository::{
    Counter, CredentialRepository, CredentialUpdate, QuotaDeduction, QuotaSnapshot,
};
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 当前请求可用的额度，`remaining` 为 `None` 表示不受限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaAllowance {
    pub remaining: Option<i64>,
}

impl QuotaAllowance {
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { remaining: None }
    }

    #[must_use]
    pub const fn limited(remaining: i64) -> Self {
        Self {
            remaining: Some(remaining),
        }
    }

    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.remaining.is_none()
    }
}

/// 用户额度统计
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub user_id: String,
    pub token_quota: i64,
    pub token_used: i64,
    pub remaining: i64,
    /// 已用比例，额度为 0 时为 0
    pub usage_rate: f64,
}

impl UsageStats {
    #[must_use]
    pub fn from_snapshot(user_id: &str, snapshot: QuotaSnapshot) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let usage_rate = if snapshot.quota > 0 {
            snapshot.used as f64 / snapshot.quota as f64
        } else {
            0.0
        };
        Self {
            user_id: user_id.to_string(),
            token_quota: snapshot.quota,
            token_used: snapshot.used,
            remaining: snapshot.remaining(),
            usage_rate,
        }
    }
}

/// 用户额度控制器
pub struct QuotaGovernor {
    repo: Arc<dyn CredentialRepository>,
}

impl QuotaGovernor {
    #[must_use]
    pub fn new(repo: Arc<dyn CredentialRepository>) -> Self {
        Self { repo }
    }

    /// 检查额度，管理员无条件放行
    pub async fn check(&self, identity: &Identity) -> Result<QuotaAllowance> {
        if identity.role.is_admin() {
            return Ok(QuotaAllowance::unlimited());
        }

        let snapshot = self.repo.get_quota(&identity.user_id).await?;
        if snapshot.is_exhausted() {
            linfo!(
                "system",
                LogStage::Authorization,
                LogComponent::QuotaGovernor,
                "quota_exhausted",
                &format!(
                    "用户额度已用完: user_id={}, used={}, quota={}",
                    identity.user_id, snapshot.used, snapshot.quota
                )
            );
            return Err(GateError::QuotaExceeded);
        }

        Ok(QuotaAllowance::limited(snapshot.remaining()))
    }

    /// 记录实际消耗的 token 数
    pub async fn consume(&self, identity: &Identity, tokens: i64) -> Result<QuotaAllowance> {
        if tokens < 0 {
            return Err(GateError::invalid_param("tokens 不能为负数"));
        }

        if identity.role.is_admin() {
            self.repo
                .increment_field(&identity.user_id, Counter::TokenUsed, tokens)
                .await?;
            return Ok(QuotaAllowance::unlimited());
        }

        match self.repo.consume_quota(&identity.user_id, tokens).await? {
            QuotaDeduction::Applied(snapshot) => Ok(QuotaAllowance::limited(snapshot.remaining())),
            QuotaDeduction::Exhausted => Err(GateError::QuotaExceeded),
        }
    }

    /// 查询额度使用情况
    pub async fn usage(&self, user_id: &str) -> Result<UsageStats> {
        let snapshot = self.repo.get_quota(user_id).await?;
        Ok(UsageStats::from_snapshot(user_id, snapshot))
    }

    /// 将额度设置为指定值
    pub async fn adjust_quota(&self, user_id: &str, new_quota: i64) -> Result<UsageStats> {
        if new_quota < 0 {
            return Err(GateError::invalid_param("额度不能为负数"));
        }
        let update = CredentialUpdate {
            token_quota: Some(new_quota),
            ..CredentialUpdate::default()
        };
        self.repo
            .update_fields(user_id, update)
            .await
            .with_context(|| format!("调整额度失败: id={user_id}"))?;

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::QuotaGovernor,
            "adjust_quota",
            &format!("额度已调整: user_id={user_id}, quota={new_quota}")
        );
        self.usage(user_id).await
    }

    /// 在现有额度上追加，并发追加不会互相覆盖
    pub async fn grant_quota(&self, user_id: &str, amount: i64) -> Result<UsageStats> {
        if amount <= 0 {
            return Err(GateError::invalid_param("追加额度必须大于 0"));
        }
        self.repo
            .increment_field(user_id, Counter::TokenQuota, amount)
            .await
            .with_context(|| format!("追加额度失败: id={user_id}"))?;

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::QuotaGovernor,
            "grant_quota",
            &format!("额度已追加: user_id={user_id}, amount={amount}")
        );
        self.usage(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessClaims, UserRole};
    use crate::repository::{MockCredentialRepository, QuotaSnapshot};
    use mockall::predicate::eq;
    use rstest::rstest;

    fn identity(role: UserRole) -> Identity {
        Identity::from_claims(AccessClaims {
            uid: "u-1".to_string(),
            role,
            jti: "j".to_string(),
            iss: "lex-veritas".to_string(),
            iat: 0,
            nbf: 0,
            exp: i64::MAX,
        })
    }

    fn governor_with(quota: i64, used: i64) -> QuotaGovernor {
        let mut repo = MockCredentialRepository::new();
        repo.expect_get_quota()
            .returning(move |_| Ok(QuotaSnapshot { quota, used }));
        QuotaGovernor::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn test_user_with_one_token_left_passes() {
        let governor = governor_with(100_000, 99_999);
        let allowance = governor.check(&identity(UserRole::User)).await.unwrap();
        assert_eq!(allowance, QuotaAllowance::limited(1));
    }

    #[rstest]
    #[case(100_000, 100_000)]
    #[case(100, 250)]
    #[case(0, 0)]
    #[tokio::test]
    async fn test_exhausted_user_is_rejected(#[case] quota: i64, #[case] used: i64) {
        let governor = governor_with(quota, used);
        let result = governor.check(&identity(UserRole::User)).await;
        assert!(matches!(result, Err(GateError::QuotaExceeded)));
    }

    #[rstest]
    #[case(UserRole::Admin)]
    #[case(UserRole::SuperAdmin)]
    #[tokio::test]
    async fn test_admin_always_passes(#[case] role: UserRole) {
        // 管理员不查询额度
        let governor = QuotaGovernor::new(Arc::new(MockCredentialRepository::new()));
        let allowance = governor.check(&identity(role)).await.unwrap();
        assert!(allowance.is_unlimited());
    }

    #[tokio::test]
    async fn test_consume_maps_exhausted() {
        let mut repo = MockCredentialRepository::new();
        repo.expect_consume_quota()
            .with(eq("u-1"), eq(10))
            .returning(|_, _| Ok(QuotaDeduction::Exhausted));
        let governor = QuotaGovernor::new(Arc::new(repo));

        let result = governor.consume(&identity(UserRole::User), 10).await;
        assert!(matches!(result, Err(GateError::QuotaExceeded)));
    }

    #[tokio::test]
    async fn test_admin_usage_is_recorded_unbounded() {
        let mut repo = MockCredentialRepository::new();
        repo.expect_increment_field()
            .with(eq("u-1"), eq(Counter::TokenUsed), eq(500))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let governor = QuotaGovernor::new(Arc::new(repo));

        let allowance = governor.consume(&identity(UserRole::Admin), 500).await.unwrap();
        assert!(allowance.is_unlimited());
    }

    #[tokio::test]
    async fn test_negative_tokens_rejected() {
        let governor = QuotaGovernor::new(Arc::new(MockCredentialRepository::new()));
        let result = governor.consume(&identity(UserRole::User), -1).await;
        assert!(matches!(result, Err(GateError::InvalidParam { .. })));
    }

    #[test]
    fn test_usage_stats_rate() {
        let stats = UsageStats::from_snapshot("u-1", QuotaSnapshot { quota: 200, used: 50 });
        assert_eq!(stats.remaining, 150);
        assert!((stats.usage_rate - 0.25).abs() < f64::EPSILON);

        let empty = UsageStats::from_snapshot("u-1", QuotaSnapshot { quota: 0, used: 0 });
        assert!(empty.usage_rate.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_negative_quota_never_reaches_repository() {
        let mut repo = MockCredentialRepository::new();
        repo.expect_update_fields().never();
        let governor = QuotaGovernor::new(Arc::new(repo));

        let result = governor.adjust_quota("u-1", -1).await;
        assert!(matches!(result, Err(GateError::InvalidParam { .. })));
    }

    #[tokio::test]
    async fn test_grant_increments_quota_column() {
        let mut repo = MockCredentialRepository::new();
        repo.expect_increment_field()
            .with(eq("u-1"), eq(Counter::TokenQuota), eq(1_000))
            .times(1)
            .returning(|_, _, _| Ok(()));
        repo.expect_get_quota()
            .returning(|_| Ok(QuotaSnapshot { quota: 2_000, used: 500 }));
        let governor = QuotaGovernor::new(Arc::new(repo));

        let stats = governor.grant_quota("u-1", 1_000).await.unwrap();
        assert_eq!(stats.token_quota, 2_000);
        assert_eq!(stats.remaining, 1_500);
    }

    #[tokio::test]
    async fn test_adjust_missing_user_keeps_not_found_mapping() {
        let mut repo = MockCredentialRepository::new();
        repo.expect_update_fields()
            .returning(|_, _| Err(GateError::UserNotFound));
        let governor = QuotaGovernor::new(Arc::new(repo));

        let err = governor.adjust_quota("ghost", 10).await.unwrap_err();
        assert_eq!(err.status_and_code().1, 2001);
    }
}
