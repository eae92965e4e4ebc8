//! # 路由配置
//!
//! `/api/v1` 下的全部业务路由；每组路由通过 `route_layer` 挂载各自的访问控制，
//! 后挂载的中间件先执行。

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};

use super::handlers::{admin, auth, chat, users};
use super::middleware::{
    AllowedRoles, guest_throttle, jwt_auth, optional_auth, quota_guard, require_role,
};
use super::server::AppState;

/// API 路由前缀
pub const API_PREFIX: &str = "/api/v1";

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth_routes(&state))
        .nest("/users", user_routes(&state))
        .nest("/chat", chat_routes(&state))
        .nest("/admin", admin_routes(&state))
        .with_state(state)
}

/// 认证路由
fn auth_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(auth::me))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth));

    Router::new()
        .route("/login", post(auth::login))
        .route("/login/phone", post(auth::login_by_phone))
        .route("/send-code", post(auth::send_code))
        .route("/register", post(auth::register))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/reset-password", post(auth::reset_password))
        .merge(protected)
}

/// 用户自助路由
fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/me", put(users::update_profile))
        .route("/me/password", put(users::change_password))
        .route("/me/quota", get(users::my_quota))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth))
}

/// 对话路由：可选认证 -> 匿名限制 -> 额度
fn chat_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/usage", post(chat::record_usage))
        .route_layer(from_fn_with_state(state.clone(), quota_guard))
        .route_layer(from_fn_with_state(state.clone(), guest_throttle))
        .route_layer(from_fn_with_state(state.clone(), optional_auth))
}

/// 管理员路由
fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users/{id}", get(admin::get_user))
        .route("/users/{id}/quota", put(admin::adjust_quota))
        .route("/users/{id}/quota/grant", post(admin::grant_quota))
        .route("/users/{id}/status", put(admin::update_status))
        .route("/users/{id}/role", put(admin::update_role))
        .route_layer(from_fn_with_state(AllowedRoles::ADMINS, require_role))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth))
}
