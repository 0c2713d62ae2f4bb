//! 聊天室核心领域模型
//!
//! 包含参与者、聊天消息以及相关的值对象和错误定义。
//! 这一层不做任何 I/O，存储与时间来源都由上层注入。

pub mod errors;
pub mod message;
pub mod participant;
pub mod value_objects;

pub use errors::{DomainError, DomainResult, RepositoryError};
pub use message::{ChatMessage, MessageKind, StoredMessage, JOIN_TEXT, LEAVE_TEXT};
pub use participant::Participant;
pub use value_objects::{DisplayName, EpochMillis, MessageTime, Recipient, BROADCAST_TOKEN};
