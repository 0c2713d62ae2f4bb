use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 广播接收者标识，代表“所有人”。
pub const BROADCAST_TOKEN: &str = "Todos";

/// 自 Unix 纪元起的毫秒数。
pub type EpochMillis = i64;

/// 经过验证的显示名称。
///
/// 名称在比较时大小写不敏感，`key()` 返回用于唯一约束的折叠形式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::invalid_argument("name", "cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 大小写折叠后的名称，作为存储主键。
    pub fn key(&self) -> String {
        Self::fold(&self.0)
    }

    pub fn matches(&self, other: &str) -> bool {
        self.key() == Self::fold(other)
    }

    pub fn fold(value: &str) -> String {
        value.trim().to_lowercase()
    }

    /// 与广播标识同名（忽略大小写）的名称不能注册
    pub fn is_reserved(value: &str) -> bool {
        Self::fold(value) == Self::fold(BROADCAST_TOKEN)
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DisplayName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

/// 消息接收者：广播或某个具体参与者。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Everyone,
    Participant(DisplayName),
}

impl Recipient {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim() == BROADCAST_TOKEN {
            return Ok(Self::Everyone);
        }
        DisplayName::parse(value)
            .map(Self::Participant)
            .map_err(|_| DomainError::invalid_argument("to", "cannot be empty"))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Everyone => BROADCAST_TOKEN,
            Self::Participant(name) => name.as_str(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Everyone)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 墙上时钟时间，格式固定为 `HH:MM:SS`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageTime(String);

impl MessageTime {
    pub const FORMAT: &'static str = "%H:%M:%S";

    /// 按本地时区渲染。
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.with_timezone(&Local).format(Self::FORMAT).to_string())
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        chrono::NaiveTime::parse_from_str(&value, Self::FORMAT)
            .map_err(|_| DomainError::invalid_argument("time", "expected HH:MM:SS"))?;
        if value.len() != 8 {
            return Err(DomainError::invalid_argument("time", "expected HH:MM:SS"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageTime {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MessageTime> for String {
    fn from(value: MessageTime) -> Self {
        value.0
    }
}
