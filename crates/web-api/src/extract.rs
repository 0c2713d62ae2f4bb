use axum::{extract::FromRequest, http::HeaderMap};

use crate::error::ApiError;

/// 发送者/查看者身份所在的请求头
pub const IDENTITY_HEADER: &str = "user";

/// 与 `axum::Json` 相同，但请求体不合法时返回 422
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// 按 UTF-8 解码，非 UTF-8 的请求头按缺失处理
pub fn identity(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
}
