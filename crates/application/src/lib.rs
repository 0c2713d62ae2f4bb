//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：输入校验、参与者注册、
//! 消息写入与按可见性过滤的历史查询，以及对存储和时钟的抽象。

pub mod clock;
pub mod dto;
pub mod error;
pub mod reaper;
pub mod repository;
pub mod services;
pub mod validation;

pub use clock::{Clock, SystemClock};
pub use dto::{MessageDto, ParticipantDto};
pub use error::ApplicationError;
pub use reaper::spawn_inactivity_reaper;
pub use repository::{MessageRepository, ParticipantRepository};
pub use services::{PresenceService, PresenceServiceDependencies, PresenceSettings};
pub use validation::{JoinRequest, SendMessageRequest, ValidatedMessage};
