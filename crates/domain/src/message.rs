//! 聊天消息实体
//!
//! 消息只追加、不修改。存储层为每条消息分配单调递增的 `seq`，
//! 查询结果按 `seq` 升序排列。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{DisplayName, MessageTime, Recipient, BROADCAST_TOKEN};

/// 参与者进入房间时的状态文本
pub const JOIN_TEXT: &str = "entra na sala...";
/// 参与者被移除时的状态文本
pub const LEAVE_TEXT: &str = "sai da sala...";

/// 消息类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// 系统生成的状态事件
    Status,
    /// 公开消息
    Message,
    /// 私聊消息，只对发送者和接收者可见
    PrivateMessage,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [Self::Status, Self::Message, Self::PrivateMessage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Message => "message",
            Self::PrivateMessage => "private_message",
        }
    }

    /// 可由用户发送的类型
    pub fn is_user_authored(&self) -> bool {
        matches!(self, Self::Message | Self::PrivateMessage)
    }

    /// 对所有人公开的类型
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Message | Self::Status)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::UnknownMessageKind(s.to_owned()))
    }
}

/// 待写入的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub time: MessageTime,
}

impl ChatMessage {
    pub fn joined(name: &DisplayName, time: MessageTime) -> Self {
        Self::status(name, JOIN_TEXT, time)
    }

    pub fn left(name: &DisplayName, time: MessageTime) -> Self {
        Self::status(name, LEAVE_TEXT, time)
    }

    fn status(name: &DisplayName, text: &str, time: MessageTime) -> Self {
        Self {
            from: name.as_str().to_owned(),
            to: BROADCAST_TOKEN.to_owned(),
            text: Some(text.to_owned()),
            kind: MessageKind::Status,
            time,
        }
    }

    /// 用户发送的消息；`kind` 只能是 `message` 或 `private_message`。
    pub fn authored(
        from: &DisplayName,
        to: &Recipient,
        text: impl Into<String>,
        kind: MessageKind,
        time: MessageTime,
    ) -> Result<Self, DomainError> {
        if !kind.is_user_authored() {
            return Err(DomainError::invalid_argument(
                "type",
                "must be message or private_message",
            ));
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::invalid_argument("text", "cannot be empty"));
        }
        Ok(Self {
            from: from.as_str().to_owned(),
            to: to.as_str().to_owned(),
            text: Some(text),
            kind,
            time,
        })
    }

    /// 可见性规则：公开消息和状态事件对所有人可见，
    /// 其余消息只对发送者、接收者以及广播目标可见。
    pub fn is_visible_to(&self, viewer: &str) -> bool {
        let viewer = DisplayName::fold(viewer);
        self.kind.is_public()
            || self.to == BROADCAST_TOKEN
            || DisplayName::fold(&self.from) == viewer
            || DisplayName::fold(&self.to) == viewer
    }
}

/// 已持久化的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(default, skip_serializing)]
    pub seq: i64,
    #[serde(flatten)]
    pub message: ChatMessage,
}
