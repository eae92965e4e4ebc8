//! # 管理员处理器

use axum::{
    Extension,
    extract::{Path, State},
};

use crate::api::dto::{
    AdjustQuotaRequest, GrantQuotaRequest, UpdateRoleRequest, UpdateStatusRequest, ValidJson,
};
use crate::api::response::{ApiResult, success, success_with_message};
use crate::api::server::AppState;
use crate::auth::Identity;

/// 按 ID 查询用户
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let user = state.gate.get_current_user(&id).await?;
    Ok(success(user))
}

/// 设置用户额度
pub async fn adjust_quota(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<AdjustQuotaRequest>,
) -> ApiResult {
    let stats = state.quota.adjust_quota(&id, req.new_quota).await?;
    Ok(success_with_message(stats, "配额调整成功"))
}

/// 追加用户额度
pub async fn grant_quota(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<GrantQuotaRequest>,
) -> ApiResult {
    let stats = state.quota.grant_quota(&id, req.amount).await?;
    Ok(success_with_message(stats, "配额追加成功"))
}

/// 修改账户状态
pub async fn update_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateStatusRequest>,
) -> ApiResult {
    let user = state.gate.update_status(&actor, &id, req.status).await?;
    Ok(success_with_message(user, "状态修改成功"))
}

/// 修改用户角色
pub async fn update_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateRoleRequest>,
) -> ApiResult {
    let user = state.gate.update_role(&actor, &id, req.role).await?;
    Ok(success_with_message(user, "角色修改成功"))
}
