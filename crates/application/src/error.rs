use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 输入不合法，包含全部字段的错误描述
    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
    #[error("name already in use")]
    NameConflict,
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),
    #[error("missing identity header")]
    MissingIdentity,
    #[error("participant not found: {0}")]
    ParticipantNotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
    /// 加入过程中的写入失败且参与者记录回滚失败，需要人工对账
    #[error("join of {name} left inconsistent state: write failed ({cause}), rollback failed ({rollback})")]
    InconsistentJoin {
        name: String,
        cause: RepositoryError,
        rollback: RepositoryError,
    },
}

impl ApplicationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(vec![message.into()])
    }

    /// 调用方可以自行修正的错误
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::InconsistentJoin { .. })
    }
}

impl From<DomainError> for ApplicationError {
    fn from(value: DomainError) -> Self {
        Self::ValidationFailed(vec![value.to_string()])
    }
}
