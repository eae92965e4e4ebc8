//! # HTTP 服务器
//!
//! 组装路由与全局中间件，并负责监听与优雅关闭

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::health;
use super::middleware::{rate_limit, request_id_middleware};
use super::routes::{API_PREFIX, create_routes};
use crate::app::AppContext;
use crate::error::{GateError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};

/// HTTP 应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
}

/// 构建完整路由
///
/// 全局中间件由外到内：Trace、RequestId、CORS、超时、限流
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout.max(1));

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer())
        .layer(TimeoutLayer::new(timeout))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .nest(API_PREFIX, create_routes(state.clone()))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready).with_state(state))
        .layer(middleware)
}

/// 启动服务器，收到 Ctrl+C 或 SIGTERM 后优雅关闭
pub async fn serve(context: Arc<AppContext>) -> Result<()> {
    let addr = context.config.listen_addr();
    let state = AppState::new(context);

    let sweeper = state.rate_limiter.spawn_sweeper();
    let router = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GateError::config_with_source(format!("无法监听 {addr}"), e))?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Http,
        "server_start",
        &format!("HTTP 服务启动: {addr}")
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| GateError::internal_with_source("HTTP 服务异常退出", e))?;

    sweeper.abort();
    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Http,
        "server_stopped",
        "HTTP 服务已停止"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
