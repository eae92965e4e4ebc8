//! 验证码与访问限制组件在共享存储上的行为

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use lex_gate::GateError;
use lex_gate::auth::{VerificationCodeManager, VerificationPurpose};
use lex_gate::config::{RateLimitConfig, VerificationConfig};
use lex_gate::limits::RateLimiter;
use lex_gate::testing::RecordingEmailSender;
use rstest::rstest;

const EMAIL: &str = "dave@example.com";

#[tokio::test]
async fn code_verifies_exactly_once() {
    let ctx = common::context().await;
    let verification = &ctx.context.verification;

    verification.send_code(EMAIL, VerificationPurpose::Register).await.unwrap();
    let code = ctx.mailer.last_code_for(EMAIL).unwrap();
    assert_eq!(code.len(), 6);

    verification
        .verify_code(EMAIL, &code, VerificationPurpose::Register)
        .await
        .unwrap();
    let again = verification
        .verify_code(EMAIL, &code, VerificationPurpose::Register)
        .await;
    assert!(matches!(again, Err(GateError::CodeExpired)));
}

#[tokio::test]
async fn wrong_codes_lock_verification() {
    let ctx = common::context().await;
    let verification = &ctx.context.verification;

    verification.send_code(EMAIL, VerificationPurpose::ResetPassword).await.unwrap();
    let code = ctx.mailer.last_code_for(EMAIL).unwrap();
    let wrong = if code == "999999" { "000000" } else { "999999" };

    for _ in 0..5 {
        let result = verification
            .verify_code(EMAIL, wrong, VerificationPurpose::ResetPassword)
            .await;
        assert!(matches!(result, Err(GateError::CodeInvalid)));
    }

    let locked = verification
        .verify_code(EMAIL, &code, VerificationPurpose::ResetPassword)
        .await;
    assert!(matches!(locked, Err(GateError::TooManyAttempts)));
}

#[tokio::test]
async fn failed_delivery_releases_cooldown() {
    let ctx = common::context().await;
    let failing = VerificationCodeManager::new(
        ctx.store.clone(),
        Arc::new(RecordingEmailSender::failing()),
        VerificationConfig::default(),
    );

    let result = failing.send_code(EMAIL, VerificationPurpose::Register).await;
    assert!(matches!(result, Err(GateError::Email { .. })));

    // 共享同一存储，投递失败后可以立即重发
    ctx.context
        .verification
        .send_code(EMAIL, VerificationPurpose::Register)
        .await
        .unwrap();
    assert_eq!(ctx.mailer.sent().len(), 1);
}

#[rstest]
#[case(1, 1)]
#[case(5, 2)]
#[case(20, 10)]
fn bucket_admits_capacity_then_one_per_interval(#[case] burst: u32, #[case] rate: u32) {
    let limiter = RateLimiter::new(RateLimitConfig {
        enabled: true,
        rate,
        burst,
        max_tracked_clients: 16,
        idle_ttl: 60,
        ..RateLimitConfig::default()
    });
    let start = Instant::now();

    let admitted = (0..=burst).filter(|_| limiter.allow_at("10.1.1.1", start)).count();
    assert_eq!(admitted, burst as usize);

    let later = start + Duration::from_secs_f64(1.0 / f64::from(rate));
    assert!(limiter.allow_at("10.1.1.1", later));
    assert!(!limiter.allow_at("10.1.1.1", later));
}
