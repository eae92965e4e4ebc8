//! # 认证中间件
//!
//! `jwt_auth` 要求有效的 Bearer 令牌，`optional_auth` 在任何失败时按匿名继续，
//! `require_role` 在已认证身份上做角色校验。

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::api::middleware::RequestId;
use crate::api::server::AppState;
use crate::auth::{Identity, UserRole};
use crate::error::GateError;
use crate::logging::sanitize_token;
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// Bearer 令牌提取失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    Missing,
    Malformed,
}

impl From<BearerError> for GateError {
    fn from(err: BearerError) -> Self {
        match err {
            BearerError::Missing => Self::unauthorized("缺少认证信息"),
            BearerError::Malformed => Self::unauthorized("认证格式错误"),
        }
    }
}

/// 从 `Authorization: Bearer <token>` 提取令牌
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, BearerError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(BearerError::Missing)?
        .to_str()
        .map_err(|_| BearerError::Malformed)?;

    let (scheme, token) = value.split_once(' ').ok_or(BearerError::Malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(BearerError::Malformed);
    }
    Ok(token)
}

fn request_id(request: &Request) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| "system".to_string(), ToString::to_string)
}

/// 强制认证
pub async fn jwt_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let request_id = request_id(&request);
    let token = bearer_token(request.headers())?;

    let identity = match state.gate.authenticate(token).await {
        Ok(identity) => identity,
        Err(e) => {
            lwarn!(
                request_id,
                LogStage::Authentication,
                LogComponent::AccessGate,
                "token_rejected",
                &format!("令牌校验失败: token={}, error={e}", sanitize_token(token))
            );
            return Err(e);
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// 可选认证，失败时按匿名请求继续
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let identity = match bearer_token(request.headers()) {
        Ok(token) => state.gate.authenticate(token).await.ok(),
        Err(_) => None,
    };

    if let Some(identity) = identity {
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

/// 允许访问的角色集合
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [UserRole]);

impl AllowedRoles {
    pub const ADMINS: Self = Self(&[UserRole::Admin, UserRole::SuperAdmin]);

    #[must_use]
    pub fn permits(&self, role: UserRole) -> bool {
        self.0.contains(&role)
    }
}

/// 角色校验，必须位于 `jwt_auth` 之后
pub async fn require_role(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let Some(identity) = request.extensions().get::<Identity>() else {
        return Err(GateError::unauthorized("未认证"));
    };

    if !allowed.permits(identity.role) {
        ldebug!(
            request_id(&request),
            LogStage::Authorization,
            LogComponent::AccessGate,
            "role_denied",
            &format!("角色不满足: user_id={}, role={}", identity.user_id, identity.role)
        );
        return Err(GateError::forbidden("权限不足"));
    }

    Ok(next.run(request).await)
}
