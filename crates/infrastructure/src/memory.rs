//! 内存存储实现
//!
//! 参与者表以大小写折叠后的名称为键，条件插入在写锁内完成；
//! 消息表是只追加的数组，序号由计数器分配。
//! 适用于测试与单实例部署，进程退出后数据丢失。

use std::{collections::BTreeMap, num::NonZeroUsize, sync::Arc};

use application::repository::{MessageRepository, ParticipantRepository};
use async_trait::async_trait;
use domain::{ChatMessage, DisplayName, EpochMillis, Participant, RepositoryError, StoredMessage};
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryParticipantRepository {
    data: Arc<RwLock<BTreeMap<String, Participant>>>,
}

impl InMemoryParticipantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParticipantRepository for InMemoryParticipantRepository {
    async fn exists(&self, name: &DisplayName) -> Result<bool, RepositoryError> {
        Ok(self.data.read().await.contains_key(&name.key()))
    }

    async fn insert(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        let mut guard = self.data.write().await;
        let key = participant.name.key();
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(key, participant.clone());
        Ok(participant)
    }

    async fn list(&self) -> Result<Vec<Participant>, RepositoryError> {
        Ok(self.data.read().await.values().cloned().collect())
    }

    async fn touch(&self, name: &DisplayName, now: EpochMillis) -> Result<(), RepositoryError> {
        let mut guard = self.data.write().await;
        let participant = guard.get_mut(&name.key()).ok_or(RepositoryError::NotFound)?;
        participant.touch(now);
        Ok(())
    }

    async fn remove(&self, name: &DisplayName) -> Result<(), RepositoryError> {
        self.data
            .write()
            .await
            .remove(&name.key())
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn remove_inactive(
        &self,
        cutoff: EpochMillis,
    ) -> Result<Vec<Participant>, RepositoryError> {
        let mut guard = self.data.write().await;
        let stale: Vec<String> = guard
            .iter()
            .filter(|(_, participant)| participant.is_inactive_since(cutoff))
            .map(|(key, _)| key.clone())
            .collect();

        Ok(stale
            .into_iter()
            .filter_map(|key| guard.remove(&key))
            .collect())
    }
}

#[derive(Default)]
struct MessageLog {
    next_seq: i64,
    entries: Vec<StoredMessage>,
}

#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    log: Arc<RwLock<MessageLog>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: ChatMessage) -> Result<StoredMessage, RepositoryError> {
        let mut log = self.log.write().await;
        log.next_seq += 1;
        let stored = StoredMessage {
            seq: log.next_seq,
            message,
        };
        log.entries.push(stored.clone());
        Ok(stored)
    }

    async fn visible_to(
        &self,
        viewer: &DisplayName,
        limit: Option<NonZeroUsize>,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let log = self.log.read().await;
        let visible: Vec<&StoredMessage> = log
            .entries
            .iter()
            .filter(|stored| stored.message.is_visible_to(viewer.as_str()))
            .collect();

        let skip = limit.map_or(0, |n| visible.len().saturating_sub(n.get()));
        Ok(visible.into_iter().skip(skip).cloned().collect())
    }
}

/// 内存存储句柄
#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub participant_repository: InMemoryParticipantRepository,
    pub message_repository: InMemoryMessageRepository,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}
