//! # 匿名用户中间件
//!
//! 仅作用于未认证请求：解析或分配 guest id，超出对话次数时拒绝，
//! 新分配的 id 通过 `Set-Cookie` 下发。

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::{COOKIE, SET_COOKIE}},
    middleware::Next,
    response::Response,
};

use crate::api::server::AppState;
use crate::auth::Identity;
use crate::error::GateError;

pub async fn guest_throttle(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    if !state.guest.is_enabled() || request.extensions().get::<Identity>().is_some() {
        return Ok(next.run(request).await);
    }

    let cookie_header = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    let (guest_id, is_new) = state
        .guest
        .resolve_guest_id((!cookie_header.is_empty()).then_some(cookie_header.as_str()));

    let context = state.guest.check(&guest_id, is_new).await?;
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if is_new {
        let cookie = state.guest.cookie_value(&guest_id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    Ok(response)
}
