//! 健康检查相关处理器

use axum::extract::State;
use serde_json::json;

use crate::api::response::{ApiResult, success};
use crate::api::server::AppState;
use crate::error::GateError;

/// 存活检查
pub async fn health() -> ApiResult {
    Ok(success(json!({ "status": "ok" })))
}

/// 就绪检查：会话存储与数据库均可用
pub async fn ready(State(state): State<AppState>) -> ApiResult {
    state.store.ping().await?;
    state
        .db
        .ping()
        .await
        .map_err(|e| GateError::database_with_source("数据库不可用", e))?;

    Ok(success(json!({
        "status": "ready",
        "store": state.store.backend(),
    })))
}
