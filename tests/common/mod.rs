//! 集成测试公共工具

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use lex_gate::api::{AppState, build_router};
use lex_gate::config::AppConfig;
use lex_gate::testing::{TestContext, test_config};
use serde_json::Value;
use tower::ServiceExt;

pub async fn context() -> TestContext {
    context_with(test_config()).await
}

pub async fn context_with(config: AppConfig) -> TestContext {
    TestContext::new(config).await.unwrap()
}

pub fn router(ctx: &TestContext) -> Router {
    build_router(AppState::new(ctx.context.clone()))
}

/// 一次请求的结果
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn code(&self) -> i64 {
        self.body["code"].as_i64().unwrap()
    }

    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// 构造请求
pub struct RequestSpec {
    builder: axum::http::request::Builder,
    body: Body,
}

impl RequestSpec {
    pub fn get(uri: &str) -> Self {
        Self {
            builder: Request::builder().method("GET").uri(uri),
            body: Body::empty(),
        }
    }

    pub fn post(uri: &str, body: &Value) -> Self {
        Self {
            builder: Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json"),
            body: Body::from(body.to_string()),
        }
    }

    pub fn put(uri: &str, body: &Value) -> Self {
        Self {
            builder: Request::builder()
                .method("PUT")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json"),
            body: Body::from(body.to_string()),
        }
    }

    /// 模拟连接地址，`serve` 中由 `ConnectInfo` 提供
    pub fn peer(mut self, addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().unwrap();
        self.builder = self.builder.extension(ConnectInfo(addr));
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self.builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub async fn send(self, router: &Router) -> TestResponse {
        let request = self.builder.body(self.body).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse { status, headers, body }
    }
}

/// 从 `Set-Cookie` 中取出 `name=value` 部分
pub fn cookie_pair(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}
