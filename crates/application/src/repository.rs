use std::num::NonZeroUsize;

use async_trait::async_trait;
use domain::{ChatMessage, DisplayName, EpochMillis, Participant, RepositoryError, StoredMessage};

/// 参与者注册表
///
/// `insert` 必须依靠存储层的唯一约束（大小写折叠后的名称）实现原子的
/// 条件插入，名称冲突时返回 `RepositoryError::Conflict`。
/// `exists` 只是快速路径，不能作为唯一性的依据。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    async fn exists(&self, name: &DisplayName) -> Result<bool, RepositoryError>;
    async fn insert(&self, participant: Participant) -> Result<Participant, RepositoryError>;
    async fn list(&self) -> Result<Vec<Participant>, RepositoryError>;
    /// 刷新最后活动时间，参与者不存在时返回 `NotFound`
    async fn touch(&self, name: &DisplayName, now: EpochMillis) -> Result<(), RepositoryError>;
    async fn remove(&self, name: &DisplayName) -> Result<(), RepositoryError>;
    /// 原子地删除并返回 `last_status` 早于 `cutoff` 的参与者
    async fn remove_inactive(&self, cutoff: EpochMillis)
        -> Result<Vec<Participant>, RepositoryError>;
}

/// 只追加的消息存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 分配递增序号并持久化
    async fn append(&self, message: ChatMessage) -> Result<StoredMessage, RepositoryError>;

    /// 按序号升序返回 `viewer` 可见的消息；给定 `limit` 时只保留最新的 `limit` 条
    async fn visible_to(
        &self,
        viewer: &DisplayName,
        limit: Option<NonZeroUsize>,
    ) -> Result<Vec<StoredMessage>, RepositoryError>;
}
