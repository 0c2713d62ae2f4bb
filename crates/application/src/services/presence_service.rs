use std::{future::Future, num::NonZeroUsize, sync::Arc, time::Duration};

use domain::{
    ChatMessage, DisplayName, MessageTime, Participant, Recipient, RepositoryError,
};

use crate::{
    clock::Clock,
    dto::{MessageDto, ParticipantDto},
    error::ApplicationError,
    repository::{MessageRepository, ParticipantRepository},
    validation::{self, JoinRequest, SendMessageRequest, ValidatedMessage},
};

#[derive(Debug, Clone)]
pub struct PresenceSettings {
    /// 单次存储调用的超时时间
    pub operation_timeout: Duration,
    /// 超过该时长没有心跳的参与者会被清理
    pub inactivity_timeout: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            inactivity_timeout: Duration::from_secs(10),
        }
    }
}

pub struct PresenceServiceDependencies {
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 在线状态与消息保留服务
///
/// 唯一同时访问参与者注册表和消息存储的组件。加入操作的两次写入
/// （注册参与者 + 追加状态消息）对调用方表现为一个整体：注册超时或
/// 第二次写入失败时会删除刚注册的参与者，删除也失败时返回 `InconsistentJoin`。
pub struct PresenceService {
    deps: PresenceServiceDependencies,
    settings: PresenceSettings,
}

impl PresenceService {
    pub fn new(deps: PresenceServiceDependencies, settings: PresenceSettings) -> Self {
        Self { deps, settings }
    }

    pub fn settings(&self) -> &PresenceSettings {
        &self.settings
    }

    async fn bounded<T, F>(&self, operation: &'static str, future: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        match tokio::time::timeout(self.settings.operation_timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.settings.operation_timeout.as_millis() as u64,
                    "storage operation timed out"
                );
                Err(RepositoryError::Timeout)
            }
        }
    }

    pub async fn join(&self, request: JoinRequest) -> Result<ParticipantDto, ApplicationError> {
        let name = validation::validate_join(request)?;
        let participants = &self.deps.participant_repository;

        if self
            .bounded("participants.exists", participants.exists(&name))
            .await?
        {
            return Err(ApplicationError::NameConflict);
        }

        let now = self.deps.clock.now();
        let participant = Participant::register(name.clone(), now.timestamp_millis());
        let stored = match self
            .bounded("participants.insert", participants.insert(participant))
            .await
        {
            Ok(stored) => stored,
            // 并发加入时由唯一约束兜底
            Err(RepositoryError::Conflict) => return Err(ApplicationError::NameConflict),
            // 超时不代表未写入，按写入成功处理并回滚
            Err(RepositoryError::Timeout) => {
                return Err(self
                    .roll_back_join(&name, "participants.insert", RepositoryError::Timeout)
                    .await)
            }
            Err(err) => return Err(err.into()),
        };

        let announcement = ChatMessage::joined(&name, MessageTime::from_datetime(now));
        if let Err(append) = self
            .bounded(
                "messages.append",
                self.deps.message_repository.append(announcement),
            )
            .await
        {
            return Err(self.roll_back_join(&name, "messages.append", append).await);
        }

        tracing::info!(participant = %name, "participant joined");
        Ok(ParticipantDto::from(&stored))
    }

    async fn roll_back_join(
        &self,
        name: &DisplayName,
        failed_step: &'static str,
        cause: RepositoryError,
    ) -> ApplicationError {
        match self
            .bounded(
                "participants.remove",
                self.deps.participant_repository.remove(name),
            )
            .await
        {
            Ok(()) | Err(RepositoryError::NotFound) => {
                tracing::warn!(
                    participant = %name,
                    failed_step,
                    error = %cause,
                    "join failed, registration rolled back"
                );
                ApplicationError::Storage(cause)
            }
            Err(rollback) => {
                tracing::error!(
                    participant = %name,
                    failed_step,
                    error = %cause,
                    rollback_error = %rollback,
                    "participant registered without a status message"
                );
                ApplicationError::InconsistentJoin {
                    name: name.to_string(),
                    cause,
                    rollback,
                }
            }
        }
    }

    pub async fn post_message(
        &self,
        sender: Option<&str>,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let sender = validation::validate_sender_header(sender)?;
        let ValidatedMessage { to, text, kind } = validation::validate_message(request)?;

        if let Recipient::Participant(recipient) = &to {
            let found = self
                .bounded(
                    "participants.exists",
                    self.deps.participant_repository.exists(recipient),
                )
                .await?;
            if !found {
                return Err(ApplicationError::RecipientNotFound(recipient.to_string()));
            }
        }

        let time = MessageTime::from_datetime(self.deps.clock.now());
        let message = ChatMessage::authored(&sender, &to, text, kind, time)?;
        let stored = self
            .bounded("messages.append", self.deps.message_repository.append(message))
            .await?;

        tracing::debug!(from = %sender, to = %to, kind = %kind, seq = stored.seq, "message stored");
        Ok(MessageDto::from(&stored))
    }

    pub async fn list_participants(&self) -> Result<Vec<ParticipantDto>, ApplicationError> {
        let participants = self
            .bounded("participants.list", self.deps.participant_repository.list())
            .await?;
        Ok(participants.iter().map(ParticipantDto::from).collect())
    }

    pub async fn list_messages(
        &self,
        viewer: Option<&str>,
        limit: Option<NonZeroUsize>,
    ) -> Result<Vec<MessageDto>, ApplicationError> {
        let viewer = validation::validate_sender_header(viewer)?;
        let messages = self
            .bounded(
                "messages.visible_to",
                self.deps.message_repository.visible_to(&viewer, limit),
            )
            .await?;
        Ok(messages.iter().map(MessageDto::from).collect())
    }

    pub async fn heartbeat(&self, name: Option<&str>) -> Result<(), ApplicationError> {
        let name = validation::validate_sender_header(name)?;
        let now = self.deps.clock.now_millis();
        match self
            .bounded(
                "participants.touch",
                self.deps.participant_repository.touch(&name, now),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => {
                Err(ApplicationError::ParticipantNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 清理超时未发送心跳的参与者，并为每个被清理的参与者追加离开消息。
    /// 返回被清理的数量。
    pub async fn reap_inactive(&self) -> Result<usize, ApplicationError> {
        let now = self.deps.clock.now();
        let window = i64::try_from(self.settings.inactivity_timeout.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.timestamp_millis().saturating_sub(window);

        let removed = self
            .bounded(
                "participants.remove_inactive",
                self.deps.participant_repository.remove_inactive(cutoff),
            )
            .await?;

        let time = MessageTime::from_datetime(now);
        for participant in &removed {
            let farewell = ChatMessage::left(&participant.name, time.clone());
            if let Err(err) = self
                .bounded("messages.append", self.deps.message_repository.append(farewell))
                .await
            {
                tracing::error!(
                    participant = %participant.name,
                    error = %err,
                    "failed to announce departure"
                );
            }
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "removed inactive participants");
        }
        Ok(removed.len())
    }
}
