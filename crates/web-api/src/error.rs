use application::ApplicationError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug)]
enum ErrorBody {
    /// 可由调用方修正的错误，返回 JSON 字符串数组
    Messages(Vec<String>),
    Text(&'static str),
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn unprocessable(messages: Vec<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: ErrorBody::Messages(messages),
        }
    }

    fn text(status: StatusCode, text: &'static str) -> Self {
        Self {
            status,
            body: ErrorBody::Text(text),
        }
    }

    pub fn internal_server_error() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::ValidationFailed(messages) => ApiError::unprocessable(messages),
            AppErr::MissingIdentity => {
                ApiError::unprocessable(vec!["\"User\" header is required".to_owned()])
            }
            err @ AppErr::RecipientNotFound(_) => ApiError::unprocessable(vec![err.to_string()]),
            AppErr::NameConflict => ApiError::text(StatusCode::CONFLICT, "name already in use"),
            AppErr::ParticipantNotFound(_) => {
                ApiError::text(StatusCode::NOT_FOUND, "participant not found")
            }
            // 存储错误只记录日志，不把驱动细节返回给调用方
            err @ (AppErr::Storage(_) | AppErr::InconsistentJoin { .. }) => {
                tracing::error!(error = %err, "request failed on storage");
                ApiError::internal_server_error()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::unprocessable(vec![rejection.body_text()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.body {
            ErrorBody::Messages(messages) => (self.status, Json(messages)).into_response(),
            ErrorBody::Text(text) => (self.status, text).into_response(),
        }
    }
}
