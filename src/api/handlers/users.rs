//! # 用户自助处理器

use axum::{Extension, extract::State};

use crate::api::dto::{ChangePasswordRequest, UpdateProfileRequest, ValidJson};
use crate::api::response::{ApiResult, success, success_with_message, success_without_data};
use crate::api::server::AppState;
use crate::auth::Identity;

/// 我的额度
pub async fn my_quota(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult {
    let stats = state.quota.usage(&identity.user_id).await?;
    Ok(success(stats))
}

/// 修改密码
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> ApiResult {
    state
        .gate
        .change_password(&identity.user_id, &req.old_password, &req.new_password)
        .await?;
    Ok(success_without_data("密码修改成功"))
}

/// 更新个人资料
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> ApiResult {
    let user = state.gate.update_profile(&identity.user_id, &req.name).await?;
    Ok(success_with_message(user, "资料已更新"))
}
