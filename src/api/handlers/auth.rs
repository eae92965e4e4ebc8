//! # 认证处理器

use axum::{Extension, extract::State, http::HeaderMap};

use crate::api::dto::{
    LoginRequest, PhoneLoginRequest, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    SendCodeRequest, ValidJson,
};
use crate::api::middleware::bearer_token;
use crate::api::response::{ApiResult, success, success_with_message, success_without_data};
use crate::api::server::AppState;
use crate::auth::service::normalize_email;
use crate::auth::{Identity, NewAccount, VerificationPurpose};

/// 邮箱密码登录
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult {
    let outcome = state.gate.login_by_email(&req.email, &req.password).await?;
    Ok(success(outcome))
}

/// 手机号验证码登录
pub async fn login_by_phone(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<PhoneLoginRequest>,
) -> ApiResult {
    let outcome = state.gate.login_by_phone(&req.phone, &req.code).await?;
    Ok(success(outcome))
}

/// 发送邮箱验证码
pub async fn send_code(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<SendCodeRequest>,
) -> ApiResult {
    let purpose = VerificationPurpose::parse(&req.purpose)?;
    state
        .verification
        .send_code(&normalize_email(&req.email), purpose)
        .await?;
    Ok(success_without_data("验证码已发送"))
}

/// 注册
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult {
    let account = NewAccount {
        email: req.email,
        password: req.password,
        name: req.name,
        phone: req.phone,
    };
    let user = state.gate.register_with_code(account, &req.code).await?;
    Ok(success_with_message(user, "注册成功"))
}

/// 刷新令牌
pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> ApiResult {
    let pair = state.gate.refresh_token(&req.refresh_token).await?;
    Ok(success(pair))
}

/// 注销
///
/// 不经过 `jwt_auth`，已过期但签名有效的令牌也可以注销
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let token = bearer_token(&headers)?;
    state.gate.logout(token).await?;
    Ok(success_without_data("登出成功"))
}

/// 当前用户信息
pub async fn me(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult {
    let user = state.gate.get_current_user(&identity.user_id).await?;
    Ok(success(user))
}

/// 通过验证码重置密码
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> ApiResult {
    state
        .gate
        .reset_password(&req.email, &req.code, &req.new_password)
        .await?;
    Ok(success_without_data("密码已重置"))
}
