//! # 对话用量处理器
//!
//! 记录一次已完成的对话：匿名用户累加对话次数，用户扣减额度。

use axum::{Extension, extract::State};

use crate::api::dto::{UsageRequest, UsageResponse, ValidJson};
use crate::api::response::{ApiResult, success};
use crate::api::server::AppState;
use crate::auth::Identity;
use crate::error::GateError;
use crate::limits::GuestContext;

pub async fn record_usage(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    guest: Option<Extension<GuestContext>>,
    ValidJson(req): ValidJson<UsageRequest>,
) -> ApiResult {
    if let Some(Extension(identity)) = identity {
        let allowance = state.quota.consume(&identity, req.tokens).await?;
        return Ok(success(UsageResponse::user(allowance)));
    }

    let Some(Extension(guest)) = guest else {
        return Err(GateError::unauthorized("请登录后使用"));
    };

    let count = state.guest.record_chat(&guest.guest_id, &req.session_id).await?;
    Ok(success(UsageResponse::guest(count, state.guest.remaining_after(count))))
}
