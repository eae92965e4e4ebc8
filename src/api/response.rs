//! # API 响应结构
//!
//! 所有接口统一使用 `{code, message, data}` 信封，`code` 为 0 表示成功，
//! 失败时 `code` 取自 `GateError::status_and_code` 映射表。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{CODE_SUCCESS, ErrorCode, GateError};
use crate::{ldebug, lerror, logging::{LogComponent, LogStage}};

/// 成功响应的提示信息
pub const SUCCESS_MESSAGE: &str = "success";

/// 标准响应信封
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: ErrorCode,
    pub message: String,
    pub data: Option<T>,
}

/// API响应枚举
///
/// 统一所有API出口，方便转换为 `axum::response::Response`
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    SuccessWithMessage(T, String),
    SuccessWithoutData(String),
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Success(data) => envelope(StatusCode::OK, CODE_SUCCESS, SUCCESS_MESSAGE, Some(data)),
            Self::SuccessWithMessage(data, message) => {
                envelope(StatusCode::OK, CODE_SUCCESS, &message, Some(data))
            }
            Self::SuccessWithoutData(message) => {
                envelope::<()>(StatusCode::OK, CODE_SUCCESS, &message, None)
            }
        }
    }
}

fn envelope<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: &str,
    data: Option<T>,
) -> Response {
    (
        status,
        Json(Envelope {
            code,
            message: message.to_string(),
            data,
        }),
    )
        .into_response()
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            // 细节只写日志，客户端只看到通用提示
            lerror!(
                "system",
                LogStage::Request,
                LogComponent::Http,
                "request_failed",
                &format!("请求处理失败: {self:?}")
            );
        } else {
            ldebug!(
                "system",
                LogStage::Request,
                LogComponent::Http,
                "request_rejected",
                &format!("请求被拒绝: code={code}, error={self}")
            );
        }
        envelope::<()>(status, code, &self.client_message(), None)
    }
}

/// 便捷函数：成功响应
pub fn success<T: Serialize>(data: T) -> Response {
    ApiResponse::Success(data).into_response()
}

/// 便捷函数：带消息的成功响应
pub fn success_with_message<T: Serialize>(data: T, message: &str) -> Response {
    ApiResponse::SuccessWithMessage(data, message.to_string()).into_response()
}

/// 便捷函数：无数据体的成功响应
pub fn success_without_data(message: &str) -> Response {
    ApiResponse::<()>::SuccessWithoutData(message.to_string()).into_response()
}

/// 处理器返回类型
pub type ApiResult = std::result::Result<Response, GateError>;
