//! # 额度中间件

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::server::AppState;
use crate::auth::Identity;
use crate::error::GateError;

/// 已认证用户额度耗尽时拒绝，并将剩余额度写入请求扩展
pub async fn quota_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let Some(identity) = request.extensions().get::<Identity>().cloned() else {
        return Ok(next.run(request).await);
    };

    let allowance = state.quota.check(&identity).await?;
    request.extensions_mut().insert(allowance);
    Ok(next.run(request).await)
}
